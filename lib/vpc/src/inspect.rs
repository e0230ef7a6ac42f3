// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Read-only views of the topology.
//!
//! Nothing in this module mutates driver state. Each call is one
//! fresh `list` per kind; two snapshots taken back to back may differ
//! if another invocation changed the topology in between.

use crate::Error;
use crate::Topology;
use crate::api::EthlinkInfo;
use crate::api::ListFilter;
use crate::api::PortInfo;
use crate::api::ResourceKind;
use crate::api::ResourceState;
use crate::api::SwitchInfo;
use crate::api::VmnicInfo;
use crate::resource::Resource;
use crate::table::ResourceTable;
use serde::Serialize;

/// Every resource the driver knows about, grouped by kind.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TopologySnapshot {
    pub switches: Vec<SwitchInfo>,
    pub ports: Vec<PortInfo>,
    pub vmnics: Vec<VmnicInfo>,
    pub ethlinks: Vec<EthlinkInfo>,
}

impl TopologySnapshot {
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
            && self.ports.is_empty()
            && self.vmnics.is_empty()
            && self.ethlinks.is_empty()
    }

    /// Flatten back into driver states, switches first.
    pub fn into_states(self) -> impl Iterator<Item = ResourceState> {
        self.switches
            .into_iter()
            .map(Resource::into_state)
            .chain(self.ports.into_iter().map(Resource::into_state))
            .chain(self.vmnics.into_iter().map(Resource::into_state))
            .chain(self.ethlinks.into_iter().map(Resource::into_state))
    }
}

impl<T: ResourceTable> Topology<T> {
    /// List the resources of `kind` passing `filter`.
    pub fn list_topology(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<impl Iterator<Item = ResourceState> + use<T>, Error> {
        let states = self
            .table()
            .list(kind, filter)
            .map_err(|e| Error::driver("list", e))?;
        Ok(states.into_iter())
    }

    /// List the resources of kind `R` passing `filter`.
    pub fn list<R: Resource>(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<R>, Error> {
        self.fetch_all(filter)
    }

    /// Take a snapshot of all four kinds.
    pub fn snapshot(&self) -> Result<TopologySnapshot, Error> {
        Ok(TopologySnapshot {
            switches: self.list(&ListFilter::All)?,
            ports: self.list(&ListFilter::All)?,
            vmnics: self.list(&ListFilter::All)?,
            ethlinks: self.list(&ListFilter::All)?,
        })
    }
}
