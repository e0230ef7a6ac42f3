// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The per-kind view of driver resources.
//!
//! Switches, ports, vmnics, and ethlinks all share the same
//! create/get/list/destroy shape at the driver. [`Resource`] lets the
//! engine write its fetch-and-check logic once and have it typed by
//! kind.

use crate::api::EthlinkId;
use crate::api::EthlinkInfo;
use crate::api::PortId;
use crate::api::PortInfo;
use crate::api::ResourceKind;
use crate::api::ResourceState;
use crate::api::SwitchId;
use crate::api::SwitchInfo;
use crate::api::VmnicId;
use crate::api::VmnicInfo;
use core::fmt::Debug;
use core::fmt::Display;
use uuid::Uuid;

pub trait Resource: Clone + Debug + Sized {
    const KIND: ResourceKind;

    type Id: Copy + Debug + Display + Into<Uuid> + From<Uuid>;

    fn id(&self) -> Self::Id;

    /// Narrow a driver answer to this kind, or hand it back when it
    /// is some other kind.
    fn from_state(state: ResourceState) -> Result<Self, ResourceState>;

    fn into_state(self) -> ResourceState;
}

macro_rules! impl_resource {
    ($info:ty, $id:ty, $kind:ident) => {
        impl Resource for $info {
            const KIND: ResourceKind = ResourceKind::$kind;

            type Id = $id;

            fn id(&self) -> Self::Id {
                self.id
            }

            fn from_state(state: ResourceState) -> Result<Self, ResourceState> {
                match state {
                    ResourceState::$kind(info) => Ok(info),
                    other => Err(other),
                }
            }

            fn into_state(self) -> ResourceState {
                ResourceState::$kind(self)
            }
        }
    };
}

impl_resource!(SwitchInfo, SwitchId, Switch);
impl_resource!(PortInfo, PortId, Port);
impl_resource!(VmnicInfo, VmnicId, Vmnic);
impl_resource!(EthlinkInfo, EthlinkId, Ethlink);
