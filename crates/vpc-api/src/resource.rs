// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Resource descriptors as submitted to, and reported by, the switch
//! driver.

use super::ResourceKind;
use super::id::EthlinkId;
use super::id::PortId;
use super::id::SwitchId;
use super::id::VmnicId;
use super::mac::MacAddr;
use super::vni::Vni;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Request to create a virtual switch.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SwitchSpec {
    pub id: SwitchId,
    pub name: String,
    pub vni: Vni,
}

/// Request to add a port to a switch.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PortSpec {
    pub id: PortId,
    pub switch_id: SwitchId,
    pub uplink: bool,
}

/// Request to create a VM network interface.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VmnicSpec {
    pub id: VmnicId,
    /// The NIC emulation presented to the guest, e.g. `virtio-net`.
    pub driver: String,
    pub queues: u16,
    pub mac: MacAddr,
    /// The host device name. The driver picks one when absent.
    pub devname: Option<String>,
}

/// Request to claim a host link as an uplink attachment point.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EthlinkSpec {
    pub id: EthlinkId,
    pub link_name: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ResourceSpec {
    Switch(SwitchSpec),
    Port(PortSpec),
    Vmnic(VmnicSpec),
    Ethlink(EthlinkSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Switch(_) => ResourceKind::Switch,
            Self::Port(_) => ResourceKind::Port,
            Self::Vmnic(_) => ResourceKind::Vmnic,
            Self::Ethlink(_) => ResourceKind::Ethlink,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Switch(s) => s.id.into(),
            Self::Port(p) => p.id.into(),
            Self::Vmnic(v) => v.id.into(),
            Self::Ethlink(e) => e.id.into(),
        }
    }
}

/// The far side of a port binding.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum Endpoint {
    Vmnic(VmnicId),
    Ethlink(EthlinkId),
}

impl Endpoint {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Vmnic(_) => ResourceKind::Vmnic,
            Self::Ethlink(_) => ResourceKind::Ethlink,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Vmnic(id) => id.as_uuid(),
            Self::Ethlink(id) => id.as_uuid(),
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Vmnic(id) => write!(f, "vmnic:{id}"),
            Self::Ethlink(id) => write!(f, "ethlink:{id}"),
        }
    }
}

/// Connection state of a vmnic or ethlink, as tracked by the driver.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EndpointState {
    /// Created and never connected.
    Created,
    /// Bound to a port.
    Connected,
    /// Previously bound, since unbound.
    Disconnected,
}

impl Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SwitchInfo {
    pub id: SwitchId,
    pub name: String,
    pub vni: Vni,
    /// Kernel interface index assigned by the driver.
    pub ifindex: u32,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PortInfo {
    pub id: PortId,
    pub switch_id: SwitchId,
    pub uplink: bool,
    pub endpoint: Option<Endpoint>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VmnicInfo {
    pub id: VmnicId,
    pub driver: String,
    pub queues: u16,
    pub mac: MacAddr,
    pub devname: String,
    pub ifindex: u32,
    pub port: Option<PortId>,
    pub state: EndpointState,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EthlinkInfo {
    pub id: EthlinkId,
    pub link_name: String,
    /// Whether the underlying host link is present and up.
    pub live: bool,
    pub port: Option<PortId>,
    pub state: EndpointState,
}

/// The authoritative state of one resource, as reported by the
/// driver.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    Switch(SwitchInfo),
    Port(PortInfo),
    Vmnic(VmnicInfo),
    Ethlink(EthlinkInfo),
}

impl ResourceState {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Switch(_) => ResourceKind::Switch,
            Self::Port(_) => ResourceKind::Port,
            Self::Vmnic(_) => ResourceKind::Vmnic,
            Self::Ethlink(_) => ResourceKind::Ethlink,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Switch(s) => s.id.into(),
            Self::Port(p) => p.id.into(),
            Self::Vmnic(v) => v.id.into(),
            Self::Ethlink(e) => e.id.into(),
        }
    }
}

/// Narrow a `List` request.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum ListFilter {
    #[default]
    All,
    /// Ports owned by the given switch.
    Switch(SwitchId),
    /// Ethlinks backed by the given host link.
    LinkName(String),
    /// Ports bound to the given endpoint.
    Endpoint(Endpoint),
}

impl ListFilter {
    /// Does `state` pass this filter?
    ///
    /// Filters which do not apply to a resource's kind match nothing,
    /// so that a port filter never returns switches.
    pub fn matches(&self, state: &ResourceState) -> bool {
        match (self, state) {
            (Self::All, _) => true,
            (Self::Switch(sw), ResourceState::Port(p)) => p.switch_id == *sw,
            (Self::LinkName(name), ResourceState::Ethlink(e)) => {
                e.link_name == *name
            }
            (Self::Endpoint(ep), ResourceState::Port(p)) => {
                p.endpoint == Some(*ep)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn port(switch_id: SwitchId, endpoint: Option<Endpoint>) -> ResourceState {
        ResourceState::Port(PortInfo {
            id: PortId::new().unwrap(),
            switch_id,
            uplink: false,
            endpoint,
        })
    }

    #[test]
    fn filter_by_switch() {
        let a = SwitchId::new().unwrap();
        let b = SwitchId::new().unwrap();
        let filter = ListFilter::Switch(a);
        assert!(filter.matches(&port(a, None)));
        assert!(!filter.matches(&port(b, None)));
    }

    #[test]
    fn filter_by_endpoint() {
        let sw = SwitchId::new().unwrap();
        let nic = Endpoint::Vmnic(VmnicId::new().unwrap());
        let filter = ListFilter::Endpoint(nic);
        assert!(filter.matches(&port(sw, Some(nic))));
        assert!(!filter.matches(&port(sw, None)));
    }

    #[test]
    fn filter_does_not_cross_kinds() {
        let sw = ResourceState::Switch(SwitchInfo {
            id: SwitchId::new().unwrap(),
            name: "sw0".into(),
            vni: Vni::new(100u32).unwrap(),
            ifindex: 1,
        });
        assert!(ListFilter::All.matches(&sw));
        assert!(!ListFilter::LinkName("em0".into()).matches(&sw));
    }

    #[test]
    fn state_serializes_with_kind_key() {
        let e = ResourceState::Ethlink(EthlinkInfo {
            id: "5c4acd32-1b8d-11e8-b4c7-0cc47a6c7d1e".parse().unwrap(),
            link_name: "em0".into(),
            live: true,
            port: None,
            state: EndpointState::Created,
        });
        let v: serde_json::Value = serde_json::to_value(&e).unwrap();
        assert_eq!(v["ethlink"]["link_name"], "em0");
    }
}
