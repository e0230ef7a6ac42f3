// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! An in-memory resource table.
//!
//! `MemTable` enforces the same rules the switch driver does: unique
//! identifiers and VNIs, one live ethlink per host link, no destroy
//! of a referenced resource, and an atomic `bind` that refuses a
//! second binding of an endpoint. Faults may be injected per command.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Barrier;
use std::sync::Mutex;
use std::sync::MutexGuard;
use uuid::Uuid;
use vpc::api::Endpoint;
use vpc::api::EndpointState;
use vpc::api::EthlinkInfo;
use vpc::api::ListFilter;
use vpc::api::PortId;
use vpc::api::PortInfo;
use vpc::api::ResourceKind;
use vpc::api::ResourceSpec;
use vpc::api::ResourceState;
use vpc::api::SwitchInfo;
use vpc::api::VmnicId;
use vpc::api::VmnicInfo;
use vpc::api::VpcCmd;
use vpc::api::VpcError;
use vpc::table::ResourceTable;

#[derive(Default)]
struct Inner {
    resources: Vec<ResourceState>,
    next_ifindex: u32,
    next_devname: u32,
    faults: VecDeque<(VpcCmd, VpcError)>,
    unavailable: Option<String>,
    outage_after: Option<(VpcCmd, String)>,
    calls: Vec<VpcCmd>,
}

impl Inner {
    fn find(&self, kind: ResourceKind, id: Uuid) -> Option<usize> {
        self.resources.iter().position(|r| r.kind() == kind && r.id() == id)
    }

    fn get(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<&ResourceState, VpcError> {
        self.find(kind, id)
            .map(|i| &self.resources[i])
            .ok_or(VpcError::NotFound { kind, id })
    }

    fn get_mut(
        &mut self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<&mut ResourceState, VpcError> {
        match self.find(kind, id) {
            Some(i) => Ok(&mut self.resources[i]),
            None => Err(VpcError::NotFound { kind, id }),
        }
    }

    fn port_mut(&mut self, id: PortId) -> Result<&mut PortInfo, VpcError> {
        match self.get_mut(ResourceKind::Port, id.into())? {
            ResourceState::Port(p) => Ok(p),
            _ => unreachable!(),
        }
    }

    fn endpoint_port(&self, ep: Endpoint) -> Result<Option<PortId>, VpcError> {
        match self.get(ep.kind(), ep.id())? {
            ResourceState::Vmnic(nic) => Ok(nic.port),
            ResourceState::Ethlink(link) => Ok(link.port),
            _ => unreachable!(),
        }
    }

    fn set_endpoint_port(
        &mut self,
        ep: Endpoint,
        port: Option<PortId>,
    ) -> Result<(), VpcError> {
        let state = match port {
            Some(_) => EndpointState::Connected,
            None => EndpointState::Disconnected,
        };

        match self.get_mut(ep.kind(), ep.id())? {
            ResourceState::Vmnic(nic) => {
                nic.port = port;
                nic.state = state;
            }
            ResourceState::Ethlink(link) => {
                link.port = port;
                link.state = state;
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Record `cmd` and return any fault queued for it.
    fn enter(&mut self, cmd: VpcCmd) -> Result<(), VpcError> {
        self.calls.push(cmd);

        if let Some(msg) = &self.unavailable {
            return Err(VpcError::Unavailable(msg.clone()));
        }

        if let Some(pos) = self.faults.iter().position(|(c, _)| *c == cmd) {
            if let Some((_, err)) = self.faults.remove(pos) {
                return Err(err);
            }
        }

        Ok(())
    }

    /// Record that `cmd` was applied, starting any outage armed on it.
    fn applied(&mut self, cmd: VpcCmd) {
        if let Some((after, msg)) = self.outage_after.take() {
            if after == cmd {
                self.unavailable = Some(msg);
            } else {
                self.outage_after = Some((after, msg));
            }
        }
    }

    fn create(
        &mut self,
        spec: &ResourceSpec,
    ) -> Result<ResourceState, VpcError> {
        let id = spec.id();
        if self.resources.iter().any(|r| r.id() == id) {
            return Err(VpcError::Conflict(format!("id {id} already in use")));
        }

        let state = match spec {
            ResourceSpec::Switch(sw) => {
                let dup = self.resources.iter().any(|r| {
                    matches!(r, ResourceState::Switch(s) if s.vni == sw.vni)
                });
                if dup {
                    return Err(VpcError::Conflict(format!(
                        "VNI {} already in use",
                        sw.vni
                    )));
                }

                self.next_ifindex += 1;
                ResourceState::Switch(SwitchInfo {
                    id: sw.id,
                    name: sw.name.clone(),
                    vni: sw.vni,
                    ifindex: self.next_ifindex,
                })
            }

            ResourceSpec::Port(p) => {
                self.get(ResourceKind::Switch, p.switch_id.into())?;
                ResourceState::Port(PortInfo {
                    id: p.id,
                    switch_id: p.switch_id,
                    uplink: p.uplink,
                    endpoint: None,
                })
            }

            ResourceSpec::Vmnic(v) => {
                let devname = match &v.devname {
                    Some(name) => name.clone(),
                    None => {
                        let name = format!("vmnic{}", self.next_devname);
                        self.next_devname += 1;
                        name
                    }
                };

                let dup = self.resources.iter().any(|r| {
                    matches!(r, ResourceState::Vmnic(n) if n.devname == devname)
                });
                if dup {
                    return Err(VpcError::Conflict(format!(
                        "device {devname} already exists"
                    )));
                }

                self.next_ifindex += 1;
                ResourceState::Vmnic(VmnicInfo {
                    id: v.id,
                    driver: v.driver.clone(),
                    queues: v.queues,
                    mac: v.mac,
                    devname,
                    ifindex: self.next_ifindex,
                    port: None,
                    state: EndpointState::Created,
                })
            }

            ResourceSpec::Ethlink(e) => {
                let dup = self.resources.iter().any(|r| {
                    matches!(
                        r,
                        ResourceState::Ethlink(l)
                            if l.link_name == e.link_name && l.live
                    )
                });
                if dup {
                    return Err(VpcError::Conflict(format!(
                        "link {} already attached",
                        e.link_name
                    )));
                }

                ResourceState::Ethlink(EthlinkInfo {
                    id: e.id,
                    link_name: e.link_name.clone(),
                    live: true,
                    port: None,
                    state: EndpointState::Created,
                })
            }
        };

        self.resources.push(state.clone());
        Ok(state)
    }

    fn destroy(
        &mut self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<(), VpcError> {
        let idx = self.find(kind, id).ok_or(VpcError::NotFound { kind, id })?;

        let reason = match &self.resources[idx] {
            ResourceState::Switch(sw) => {
                let ports = self
                    .resources
                    .iter()
                    .filter(|r| match r {
                        ResourceState::Port(p) => p.switch_id == sw.id,
                        _ => false,
                    })
                    .count();
                (ports > 0).then(|| format!("{ports} port(s) attached"))
            }
            ResourceState::Port(p) => {
                p.endpoint.map(|ep| format!("bound to {ep}"))
            }
            ResourceState::Vmnic(VmnicInfo { port, .. })
            | ResourceState::Ethlink(EthlinkInfo { port, .. }) => {
                port.map(|p| format!("connected to port {p}"))
            }
        };

        if let Some(reason) = reason {
            return Err(VpcError::InUse { kind, id, reason });
        }

        self.resources.remove(idx);
        Ok(())
    }

    fn bind(&mut self, port: PortId, ep: Endpoint) -> Result<(), VpcError> {
        if let Some(current) = self.port_mut(port)?.endpoint {
            return Err(VpcError::Conflict(format!(
                "port {port} already bound to {current}"
            )));
        }

        if let Some(other) = self.endpoint_port(ep)? {
            return Err(VpcError::Conflict(format!(
                "{ep} already bound to port {other}"
            )));
        }

        self.port_mut(port)?.endpoint = Some(ep);
        self.set_endpoint_port(ep, Some(port))
    }

    /// Unbinding a port with no endpoint is a no-op.
    fn unbind(&mut self, port: PortId) -> Result<(), VpcError> {
        let p = self.port_mut(port)?;
        match p.endpoint.take() {
            Some(ep) => self.set_endpoint_port(ep, None),
            None => Ok(()),
        }
    }
}

/// The in-memory resource table.
#[derive(Default)]
pub struct MemTable {
    inner: Mutex<Inner>,
    bind_gate: Mutex<Option<Arc<Barrier>>>,
}

impl MemTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Fail the next call of `cmd` with `err`.
    pub fn fail_next(&self, cmd: VpcCmd, err: VpcError) {
        self.lock().faults.push_back((cmd, err));
    }

    /// Fail every call with `Unavailable` until cleared with `None`.
    pub fn set_unavailable(&self, msg: Option<&str>) {
        self.lock().unavailable = msg.map(str::to_string);
    }

    /// Once a `cmd` has been applied, fail every later call with
    /// `Unavailable` until cleared with [`MemTable::set_unavailable`].
    pub fn fail_after(&self, cmd: VpcCmd, msg: &str) {
        self.lock().outage_after = Some((cmd, msg.to_string()));
    }

    /// Make every `bind` wait on `gate` before touching the table.
    ///
    /// With a gate sized to the number of racing callers, all of them
    /// have finished their own checks before any bind is applied.
    pub fn set_bind_gate(&self, gate: Option<Arc<Barrier>>) {
        *self.bind_gate.lock().unwrap() = gate;
    }

    /// Mark an ethlink's host link as present or gone.
    pub fn set_link_live(&self, id: vpc::api::EthlinkId, live: bool) {
        let mut inner = self.lock();
        if let Ok(ResourceState::Ethlink(link)) =
            inner.get_mut(ResourceKind::Ethlink, id.into())
        {
            link.live = live;
        }
    }

    /// Every command issued so far, in order.
    pub fn calls(&self) -> Vec<VpcCmd> {
        self.lock().calls.clone()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.lock().resources.iter().filter(|r| r.kind() == kind).count()
    }
}

impl ResourceTable for MemTable {
    fn create(&self, spec: &ResourceSpec) -> Result<ResourceState, VpcError> {
        let mut inner = self.lock();
        inner.enter(VpcCmd::Create)?;
        let state = inner.create(spec)?;
        inner.applied(VpcCmd::Create);
        Ok(state)
    }

    fn get(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<ResourceState, VpcError> {
        let mut inner = self.lock();
        inner.enter(VpcCmd::Get)?;
        inner.get(kind, id).cloned()
    }

    fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<ResourceState>, VpcError> {
        let mut inner = self.lock();
        inner.enter(VpcCmd::List)?;
        Ok(inner
            .resources
            .iter()
            .filter(|r| r.kind() == kind && filter.matches(r))
            .cloned()
            .collect())
    }

    fn destroy(&self, kind: ResourceKind, id: Uuid) -> Result<(), VpcError> {
        let mut inner = self.lock();
        inner.enter(VpcCmd::Destroy)?;
        inner.destroy(kind, id)
    }

    fn bind(&self, port: PortId, endpoint: Endpoint) -> Result<(), VpcError> {
        let gate = self.bind_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait();
        }

        let mut inner = self.lock();
        inner.enter(VpcCmd::Bind)?;
        inner.bind(port, endpoint)?;
        inner.applied(VpcCmd::Bind);
        Ok(())
    }

    fn unbind(&self, port: PortId) -> Result<(), VpcError> {
        let mut inner = self.lock();
        inner.enter(VpcCmd::Unbind)?;
        inner.unbind(port)?;
        inner.applied(VpcCmd::Unbind);
        Ok(())
    }

    fn set_vmnic_queues(
        &self,
        id: VmnicId,
        queues: u16,
    ) -> Result<VmnicInfo, VpcError> {
        let mut inner = self.lock();
        inner.enter(VpcCmd::SetVmnicQueues)?;
        match inner.get_mut(ResourceKind::Vmnic, id.into())? {
            ResourceState::Vmnic(nic) => {
                nic.queues = queues;
                Ok(nic.clone())
            }
            _ => unreachable!(),
        }
    }
}
