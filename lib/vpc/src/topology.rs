// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The topology engine.
//!
//! Each operation follows the same pattern: read the relevant
//! resources fresh from the driver, derive their state, check the
//! transition, then issue the one driver call which effects it. There
//! is no lock held across those steps; two callers may both pass the
//! checks, in which case the driver refuses the loser and that
//! refusal is returned unchanged.

use crate::Error;
use crate::api::Endpoint;
use crate::api::EthlinkId;
use crate::api::EthlinkInfo;
use crate::api::EthlinkSpec;
use crate::api::ListFilter;
use crate::api::MacAddr;
use crate::api::PortId;
use crate::api::PortInfo;
use crate::api::PortSpec;
use crate::api::ResourceKind;
use crate::api::ResourceSpec;
use crate::api::SwitchId;
use crate::api::SwitchInfo;
use crate::api::SwitchSpec;
use crate::api::VmnicId;
use crate::api::VmnicInfo;
use crate::api::VmnicSpec;
use crate::api::Vni;
use crate::resource::Resource;
use crate::state::EndpointLifecycle;
use crate::state::PortState;
use crate::state::SwitchState;
use crate::table::ResourceTable;
use slog::Logger;
use slog::debug;
use slog::info;
use uuid::Uuid;

/// Longest host link name the driver accepts (`IFNAMSIZ - 1`).
pub const MAX_LINK_NAME: usize = 15;

/// Longest switch name the driver accepts.
pub const MAX_SWITCH_NAME: usize = 64;

/// Upper bound on vmnic queue pairs.
pub const MAX_VMNIC_QUEUES: u16 = 64;

/// Parameters for [`Topology::create_vmnic`].
#[derive(Clone, Debug)]
pub struct NewVmnic {
    pub id: Option<VmnicId>,
    pub driver: String,
    pub queues: u16,
    pub mac: Option<MacAddr>,
    pub devname: Option<String>,
}

/// The topology engine, bound to one resource table.
pub struct Topology<T> {
    table: T,
    log: Logger,
}

impl<T: ResourceTable> Topology<T> {
    pub fn new(table: T, log: Logger) -> Self {
        Self { table, log }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }

    /// Fetch one resource of kind `R`.
    pub(crate) fn fetch<R: Resource>(&self, id: R::Id) -> Result<R, Error> {
        let state = self
            .table
            .get(R::KIND, id.into())
            .map_err(|e| Error::driver("get", e))?;
        R::from_state(state).map_err(|other| Error::UnexpectedState {
            want: R::KIND,
            got: other.kind(),
        })
    }

    /// Fetch every resource of kind `R` passing `filter`.
    pub(crate) fn fetch_all<R: Resource>(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<R>, Error> {
        self.table
            .list(R::KIND, filter)
            .map_err(|e| Error::driver("list", e))?
            .into_iter()
            .map(|state| {
                R::from_state(state).map_err(|other| Error::UnexpectedState {
                    want: R::KIND,
                    got: other.kind(),
                })
            })
            .collect()
    }

    /// Submit `spec` and narrow the answer to kind `R`.
    fn submit<R: Resource>(&self, spec: ResourceSpec) -> Result<R, Error> {
        debug_assert_eq!(spec.kind(), R::KIND);
        let state =
            self.table.create(&spec).map_err(|e| Error::driver("create", e))?;
        R::from_state(state).map_err(|other| Error::UnexpectedState {
            want: R::KIND,
            got: other.kind(),
        })
    }

    /// Pick the identifier for a new resource.
    ///
    /// An identifier which already names a resource of any kind is a
    /// configuration error. It is never replaced with a fresh one:
    /// either the operator reused an identifier or the entropy source
    /// is broken, and both need a human.
    fn claim_id<I>(&self, id: Option<I>) -> Result<I, Error>
    where
        I: Copy + Into<Uuid> + From<Uuid>,
    {
        let id = match id {
            Some(id) => id,
            None => crate::api::new_id::<I>()?,
        };

        for kind in ResourceKind::ALL {
            match self.table.get(kind, id.into()) {
                Ok(_) => {
                    return Err(Error::IdCollision { kind, id: id.into() });
                }
                Err(crate::api::VpcError::NotFound { .. }) => {}
                Err(e) => return Err(Error::driver("get", e)),
            }
        }

        Ok(id)
    }

    pub fn get_switch(&self, id: SwitchId) -> Result<SwitchInfo, Error> {
        self.fetch(id)
    }

    pub fn get_port(&self, id: PortId) -> Result<PortInfo, Error> {
        self.fetch(id)
    }

    pub fn get_vmnic(&self, id: VmnicId) -> Result<VmnicInfo, Error> {
        self.fetch(id)
    }

    pub fn get_ethlink(&self, id: EthlinkId) -> Result<EthlinkInfo, Error> {
        self.fetch(id)
    }

    /// The ports the driver currently reports as owned by `id`.
    pub fn switch_ports(&self, id: SwitchId) -> Result<Vec<PortInfo>, Error> {
        self.fetch_all(&ListFilter::Switch(id))
    }

    /// Create a switch carrying `vni`.
    ///
    /// The VNI check lists the driver's switches at call time rather
    /// than trusting anything remembered from earlier.
    pub fn create_switch(
        &self,
        name: &str,
        vni: Vni,
        id: Option<SwitchId>,
    ) -> Result<SwitchInfo, Error> {
        if name.is_empty() {
            return Err(Error::invalid("switch name", "must not be empty"));
        }

        if name.len() > MAX_SWITCH_NAME {
            return Err(Error::invalid(
                "switch name",
                format!("longer than {MAX_SWITCH_NAME} bytes"),
            ));
        }

        let active: Vec<SwitchInfo> = self.fetch_all(&ListFilter::All)?;
        if let Some(sw) = active.iter().find(|sw| sw.vni == vni) {
            return Err(Error::VniInUse { vni, switch_id: sw.id });
        }

        let id = self.claim_id(id)?;
        let spec = SwitchSpec { id, name: name.to_string(), vni };
        let sw: SwitchInfo = self.submit(ResourceSpec::Switch(spec))?;

        info!(
            self.log,
            "created switch";
            "switch_id" => %sw.id,
            "name" => &sw.name,
            "vni" => %sw.vni,
            "state" => %SwitchState::Active,
        );
        Ok(sw)
    }

    /// Destroy a switch, provided the driver reports no ports on it.
    pub fn destroy_switch(&self, id: SwitchId) -> Result<(), Error> {
        let sw = self.get_switch(id)?;
        let ports = self.switch_ports(id)?;

        let state = SwitchState::Active.destroy(id, ports.len()).inspect_err(
            |_| {
                debug!(
                    self.log,
                    "switch destroy refused";
                    "switch_id" => %id,
                    "ports" => ports.len(),
                );
            },
        )?;
        debug!(
            self.log,
            "switch transition";
            "switch_id" => %id,
            "state" => %state,
        );

        self.table
            .destroy(ResourceKind::Switch, id.into())
            .map_err(|e| Error::driver("destroy", e))?;

        info!(
            self.log,
            "destroyed switch";
            "switch_id" => %id,
            "vni" => %sw.vni,
            "state" => %state.destroyed(),
        );
        Ok(())
    }

    /// Attach a new, unbound port to an active switch.
    pub fn add_port(
        &self,
        switch_id: SwitchId,
        id: Option<PortId>,
        uplink: bool,
    ) -> Result<PortInfo, Error> {
        let sw = self.get_switch(switch_id)?;
        let id = self.claim_id(id)?;
        let spec = PortSpec { id, switch_id: sw.id, uplink };
        let port: PortInfo = self.submit(ResourceSpec::Port(spec))?;

        info!(
            self.log,
            "added port";
            "port_id" => %port.id,
            "switch_id" => %port.switch_id,
            "uplink" => port.uplink,
            "state" => %PortState::of(&port),
        );
        Ok(port)
    }

    /// Detach an unbound port from its switch.
    ///
    /// When `expected_switch` is given the port must belong to it.
    pub fn remove_port(
        &self,
        id: PortId,
        expected_switch: Option<SwitchId>,
    ) -> Result<(), Error> {
        let port = self.get_port(id)?;

        if let Some(expected) = expected_switch {
            if port.switch_id != expected {
                return Err(Error::WrongSwitch {
                    port: id,
                    expected,
                    actual: port.switch_id,
                });
            }
        }

        let state = PortState::of(&port).remove(id)?;

        self.table
            .destroy(ResourceKind::Port, id.into())
            .map_err(|e| Error::driver("destroy", e))?;

        info!(
            self.log,
            "removed port";
            "port_id" => %id,
            "switch_id" => %port.switch_id,
            "state" => %state,
        );
        Ok(())
    }

    /// Work out which kind of endpoint `id` names.
    pub fn resolve_endpoint(&self, id: Uuid) -> Result<Endpoint, Error> {
        let nic = self.find::<VmnicInfo>(id)?;
        let link = self.find::<EthlinkInfo>(id)?;

        match (nic, link) {
            (Some(nic), None) => Ok(Endpoint::Vmnic(nic.id)),
            (None, Some(link)) => Ok(Endpoint::Ethlink(link.id)),
            (Some(_), Some(_)) => Err(Error::AmbiguousEndpoint { id }),
            // Report the absence against the kind operators connect
            // most often.
            (None, None) => {
                Err(Error::NotFound { kind: ResourceKind::Vmnic, id })
            }
        }
    }

    fn find<R: Resource>(&self, id: Uuid) -> Result<Option<R>, Error> {
        match self.fetch::<R>(R::Id::from(id)) {
            Ok(r) => Ok(Some(r)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn endpoint_lifecycle(
        &self,
        endpoint: Endpoint,
    ) -> Result<EndpointLifecycle, Error> {
        match endpoint {
            Endpoint::Vmnic(id) => {
                Ok(EndpointLifecycle::of_vmnic(&self.get_vmnic(id)?))
            }
            Endpoint::Ethlink(id) => {
                Ok(EndpointLifecycle::of_ethlink(&self.get_ethlink(id)?))
            }
        }
    }

    /// Connect a port to a vmnic or ethlink.
    ///
    /// Uplink ports take ethlinks, all other ports take vmnics.
    /// Neither side may already be bound. The driver's `bind` has the
    /// last word: if another caller won a race for the same endpoint
    /// since these checks, its `Conflict` is returned as is.
    ///
    /// Once `bind` succeeds the port is reported as connected without
    /// asking the driver again.
    pub fn connect_port(
        &self,
        id: PortId,
        endpoint: Endpoint,
    ) -> Result<PortInfo, Error> {
        let port = self.get_port(id)?;

        let kind_ok = match endpoint {
            Endpoint::Ethlink(_) => port.uplink,
            Endpoint::Vmnic(_) => !port.uplink,
        };
        if !kind_ok {
            return Err(Error::EndpointKindMismatch {
                port: id,
                uplink: port.uplink,
                endpoint,
            });
        }

        let next = PortState::of(&port).connect(id, endpoint)?;
        let ep_next = self.endpoint_lifecycle(endpoint)?.connect(endpoint, id)?;

        // The endpoint's back-reference may lag a bind made by
        // another caller; ask the driver which ports it thinks are
        // bound to the endpoint as well.
        let bound: Vec<PortInfo> =
            self.fetch_all(&ListFilter::Endpoint(endpoint))?;
        if let Some(other) = bound.iter().find(|p| p.id != id) {
            return Err(Error::EndpointBound { endpoint, port: other.id });
        }

        self.table.bind(id, endpoint).map_err(|e| Error::driver("bind", e))?;

        info!(
            self.log,
            "connected port";
            "port_id" => %id,
            "endpoint" => %endpoint,
            "state" => %next,
            "endpoint_state" => %ep_next,
        );
        Ok(PortInfo { endpoint: Some(endpoint), ..port })
    }

    /// Disconnect a port from its endpoint.
    ///
    /// A second disconnect of the same port fails with
    /// [`Error::PortUnbound`]; nothing is sent to the driver. Once
    /// `unbind` succeeds the port is reported as unbound without
    /// asking the driver again.
    pub fn disconnect_port(
        &self,
        id: PortId,
        expected: Option<Endpoint>,
    ) -> Result<PortInfo, Error> {
        let port = self.get_port(id)?;
        let current = PortState::of(&port);

        if let (Some(expected), PortState::Bound(actual)) =
            (expected, current)
        {
            if expected != actual {
                return Err(Error::WrongEndpoint { port: id, expected, actual });
            }
        }

        let next = current.disconnect(id)?;

        self.table.unbind(id).map_err(|e| Error::driver("unbind", e))?;

        info!(
            self.log,
            "disconnected port";
            "port_id" => %id,
            "endpoint" => ?port.endpoint,
            "state" => %next,
        );
        Ok(PortInfo { endpoint: None, ..port })
    }

    /// Register a vmnic with the driver.
    pub fn create_vmnic(&self, req: NewVmnic) -> Result<VmnicInfo, Error> {
        if req.driver.is_empty() {
            return Err(Error::invalid("vmnic driver", "must not be empty"));
        }
        validate_queues(req.queues)?;

        let mac = match req.mac {
            Some(mac) if mac.is_multicast() || mac == MacAddr::ZERO => {
                return Err(Error::invalid(
                    "vmnic MAC",
                    format!("{mac} is not a unicast address"),
                ));
            }
            Some(mac) => mac,
            None => MacAddr::random_local(&mut rand::rng()),
        };

        let id = self.claim_id(req.id)?;
        let spec = VmnicSpec {
            id,
            driver: req.driver,
            queues: req.queues,
            mac,
            devname: req.devname,
        };
        let nic: VmnicInfo = self.submit(ResourceSpec::Vmnic(spec))?;

        info!(
            self.log,
            "created vmnic";
            "vmnic_id" => %nic.id,
            "devname" => &nic.devname,
            "mac" => %nic.mac,
            "queues" => nic.queues,
        );
        Ok(nic)
    }

    /// Destroy an unconnected vmnic.
    pub fn destroy_vmnic(&self, id: VmnicId) -> Result<(), Error> {
        let nic = self.get_vmnic(id)?;
        EndpointLifecycle::of_vmnic(&nic).destroy(Endpoint::Vmnic(id))?;

        self.table
            .destroy(ResourceKind::Vmnic, id.into())
            .map_err(|e| Error::driver("destroy", e))?;

        info!(self.log, "destroyed vmnic"; "vmnic_id" => %id);
        Ok(())
    }

    pub fn set_vmnic_queues(
        &self,
        id: VmnicId,
        queues: u16,
    ) -> Result<VmnicInfo, Error> {
        validate_queues(queues)?;
        let before = self.get_vmnic(id)?;

        let nic = self
            .table
            .set_vmnic_queues(id, queues)
            .map_err(|e| Error::driver("set queues", e))?;

        info!(
            self.log,
            "set vmnic queues";
            "vmnic_id" => %id,
            "from" => before.queues,
            "to" => nic.queues,
        );
        Ok(nic)
    }

    /// Claim a host link as an uplink attachment point.
    ///
    /// A link may back only one live ethlink at a time. Ethlinks the
    /// driver reports as no longer live do not hold the name.
    pub fn create_ethlink(
        &self,
        link_name: &str,
        id: Option<EthlinkId>,
    ) -> Result<EthlinkInfo, Error> {
        validate_link_name(link_name)?;

        let existing: Vec<EthlinkInfo> =
            self.fetch_all(&ListFilter::LinkName(link_name.to_string()))?;
        if let Some(link) = existing.iter().find(|l| l.live) {
            return Err(Error::LinkInUse {
                link_name: link_name.to_string(),
                id: link.id,
            });
        }

        let id = self.claim_id(id)?;
        let spec = EthlinkSpec { id, link_name: link_name.to_string() };
        let link: EthlinkInfo = self.submit(ResourceSpec::Ethlink(spec))?;

        info!(
            self.log,
            "created ethlink";
            "ethlink_id" => %link.id,
            "l2_name" => &link.link_name,
            "live" => link.live,
        );
        Ok(link)
    }

    /// Destroy an unconnected ethlink.
    pub fn destroy_ethlink(&self, id: EthlinkId) -> Result<(), Error> {
        let link = self.get_ethlink(id)?;
        EndpointLifecycle::of_ethlink(&link).destroy(Endpoint::Ethlink(id))?;

        self.table
            .destroy(ResourceKind::Ethlink, id.into())
            .map_err(|e| Error::driver("destroy", e))?;

        info!(
            self.log,
            "destroyed ethlink";
            "ethlink_id" => %id,
            "l2_name" => &link.link_name,
        );
        Ok(())
    }
}

fn validate_queues(queues: u16) -> Result<(), Error> {
    if queues == 0 || queues > MAX_VMNIC_QUEUES {
        return Err(Error::invalid(
            "queue count",
            format!("{queues} is outside 1..={MAX_VMNIC_QUEUES}"),
        ));
    }
    Ok(())
}

fn validate_link_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::invalid("link name", "must not be empty"));
    }

    if name.len() > MAX_LINK_NAME {
        return Err(Error::invalid(
            "link name",
            format!("{name:?} is longer than {MAX_LINK_NAME} bytes"),
        ));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.';
    if !name.chars().all(allowed) {
        return Err(Error::invalid(
            "link name",
            format!("{name:?} contains characters not allowed in a link name"),
        ));
    }

    Ok(())
}
