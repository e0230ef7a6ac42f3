// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The boundary to the switch driver's resource table.

use crate::api::Endpoint;
use crate::api::ListFilter;
use crate::api::PortId;
use crate::api::ResourceKind;
use crate::api::ResourceSpec;
use crate::api::ResourceState;
use crate::api::VmnicId;
use crate::api::VmnicInfo;
use crate::api::VpcError;
use uuid::Uuid;

/// The authoritative table of switches, ports, vmnics, and ethlinks.
///
/// Every method is one synchronous round trip to the driver. None of
/// them retry, and none of them consult local state: whether a
/// resource exists, is bound, or is still referenced is decided by
/// the implementation's backing store alone. In particular `bind` is
/// the point of mutual exclusion between concurrent callers, and
/// must refuse a second binding of an endpoint with
/// [`VpcError::Conflict`].
pub trait ResourceTable: Send + Sync {
    /// Submit a creation intent. The returned state carries any
    /// driver-assigned fields merged with the request.
    fn create(&self, spec: &ResourceSpec) -> Result<ResourceState, VpcError>;

    fn get(&self, kind: ResourceKind, id: Uuid)
    -> Result<ResourceState, VpcError>;

    /// Return every resource of `kind` which passes `filter`.
    fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<ResourceState>, VpcError>;

    fn destroy(&self, kind: ResourceKind, id: Uuid) -> Result<(), VpcError>;

    fn bind(&self, port: PortId, endpoint: Endpoint) -> Result<(), VpcError>;

    fn unbind(&self, port: PortId) -> Result<(), VpcError>;

    fn set_vmnic_queues(
        &self,
        id: VmnicId,
        queues: u16,
    ) -> Result<VmnicInfo, VpcError>;
}

impl<T: ResourceTable + ?Sized> ResourceTable for &T {
    fn create(&self, spec: &ResourceSpec) -> Result<ResourceState, VpcError> {
        (**self).create(spec)
    }

    fn get(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<ResourceState, VpcError> {
        (**self).get(kind, id)
    }

    fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<ResourceState>, VpcError> {
        (**self).list(kind, filter)
    }

    fn destroy(&self, kind: ResourceKind, id: Uuid) -> Result<(), VpcError> {
        (**self).destroy(kind, id)
    }

    fn bind(&self, port: PortId, endpoint: Endpoint) -> Result<(), VpcError> {
        (**self).bind(port, endpoint)
    }

    fn unbind(&self, port: PortId) -> Result<(), VpcError> {
        (**self).unbind(port)
    }

    fn set_vmnic_queues(
        &self,
        id: VmnicId,
        queues: u16,
    ) -> Result<VmnicInfo, VpcError> {
        (**self).set_vmnic_queues(id, queues)
    }
}
