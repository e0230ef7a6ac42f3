// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Lifecycle state machines for topology resources.
//!
//! The states here are never stored. They are derived from a fresh
//! driver answer at the start of an operation, and the transition
//! methods decide whether that operation may proceed. The driver
//! performs the change itself.

use crate::Error;
use crate::api::Endpoint;
use crate::api::EndpointState;
use crate::api::EthlinkInfo;
use crate::api::PortId;
use crate::api::PortInfo;
use crate::api::SwitchId;
use crate::api::VmnicInfo;
use core::fmt;
use core::fmt::Display;

/// The state of a switch port.
///
/// ```text
/// add_port() --> Unbound
///
/// Unbound -- connect_port() --> Bound
/// Unbound -- remove_port() --> Removed
///
/// Bound -- disconnect_port() --> Unbound
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PortState {
    /// Attached to its switch with no endpoint.
    Unbound,

    /// Connected to exactly one vmnic or ethlink.
    Bound(Endpoint),

    /// Detached from its switch. Terminal.
    Removed,
}

impl PortState {
    pub fn of(port: &PortInfo) -> Self {
        match port.endpoint {
            Some(ep) => Self::Bound(ep),
            None => Self::Unbound,
        }
    }

    pub fn connect(
        self,
        id: PortId,
        endpoint: Endpoint,
    ) -> Result<Self, Error> {
        match self {
            Self::Unbound => Ok(Self::Bound(endpoint)),
            Self::Bound(current) => {
                Err(Error::PortAlreadyBound { id, endpoint: current })
            }
            Self::Removed => Err(Error::NotFound {
                kind: crate::api::ResourceKind::Port,
                id: id.into(),
            }),
        }
    }

    pub fn disconnect(self, id: PortId) -> Result<Self, Error> {
        match self {
            Self::Bound(_) => Ok(Self::Unbound),
            Self::Unbound => Err(Error::PortUnbound { id }),
            Self::Removed => Err(Error::NotFound {
                kind: crate::api::ResourceKind::Port,
                id: id.into(),
            }),
        }
    }

    pub fn remove(self, id: PortId) -> Result<Self, Error> {
        match self {
            Self::Unbound => Ok(Self::Removed),
            Self::Bound(endpoint) => Err(Error::PortBound { id, endpoint }),
            Self::Removed => Err(Error::NotFound {
                kind: crate::api::ResourceKind::Port,
                id: id.into(),
            }),
        }
    }
}

impl Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "unbound"),
            Self::Bound(_) => write!(f, "bound"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// The state of a switch.
///
/// ```text
/// create_switch() --> Active
///
/// Active -- destroy_switch() --> Destroying
/// Destroying -- ports remain --> Active
/// Destroying -- driver destroy --> Destroyed
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwitchState {
    Active,
    Destroying,
    Destroyed,
}

impl SwitchState {
    /// Begin destroying a switch which currently owns `ports` ports.
    ///
    /// With ports remaining the switch stays `Active` and the
    /// request is refused.
    pub fn destroy(self, id: SwitchId, ports: usize) -> Result<Self, Error> {
        match self {
            Self::Active if ports > 0 => Err(Error::SwitchInUse { id, ports }),
            Self::Active => Ok(Self::Destroying),
            Self::Destroying | Self::Destroyed => Err(Error::NotFound {
                kind: crate::api::ResourceKind::Switch,
                id: id.into(),
            }),
        }
    }

    pub fn destroyed(self) -> Self {
        debug_assert_eq!(self, Self::Destroying);
        Self::Destroyed
    }
}

impl Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Destroying => "destroying",
            Self::Destroyed => "destroyed",
        };
        write!(f, "{s}")
    }
}

/// The lifecycle of a vmnic or ethlink.
///
/// ```text
/// create --> Created
///
/// Created -- connect --> Connected
/// Connected -- disconnect --> Disconnected
/// Disconnected -- connect --> Connected
///
/// Created -- destroy --> Destroyed
/// Disconnected -- destroy --> Destroyed
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EndpointLifecycle {
    Created,
    Connected(PortId),
    Disconnected,
    Destroyed,
}

impl EndpointLifecycle {
    fn from_parts(state: EndpointState, port: Option<PortId>) -> Self {
        // The back-reference is what the driver's bind/unbind
        // actually maintains, so it wins over the state flag.
        match (state, port) {
            (_, Some(port)) => Self::Connected(port),
            (EndpointState::Created, None) => Self::Created,
            (_, None) => Self::Disconnected,
        }
    }

    pub fn of_vmnic(nic: &VmnicInfo) -> Self {
        Self::from_parts(nic.state, nic.port)
    }

    pub fn of_ethlink(link: &EthlinkInfo) -> Self {
        Self::from_parts(link.state, link.port)
    }

    /// May `endpoint` in this state be bound to `port`?
    pub fn connect(
        self,
        endpoint: Endpoint,
        port: PortId,
    ) -> Result<Self, Error> {
        match self {
            Self::Created | Self::Disconnected => Ok(Self::Connected(port)),
            Self::Connected(current) => {
                Err(Error::EndpointBound { endpoint, port: current })
            }
            Self::Destroyed => Err(Error::NotFound {
                kind: endpoint.kind(),
                id: endpoint.id(),
            }),
        }
    }

    pub fn disconnect(self) -> Self {
        match self {
            Self::Connected(_) => Self::Disconnected,
            other => other,
        }
    }

    /// May `endpoint` in this state be destroyed?
    pub fn destroy(self, endpoint: Endpoint) -> Result<Self, Error> {
        match (self, endpoint) {
            (Self::Connected(port), Endpoint::Ethlink(id)) => {
                Err(Error::EthlinkInUse { id, port })
            }
            (Self::Connected(port), Endpoint::Vmnic(id)) => {
                Err(Error::VmnicInUse { id, port })
            }
            (Self::Destroyed, _) => Err(Error::NotFound {
                kind: endpoint.kind(),
                id: endpoint.id(),
            }),
            _ => Ok(Self::Destroyed),
        }
    }
}

impl Display for EndpointLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Connected(port) => write!(f, "connected({port})"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ErrorKind;
    use crate::api::EthlinkId;
    use crate::api::VmnicId;

    fn port_id() -> PortId {
        PortId::new().unwrap()
    }

    #[test]
    fn port_cycle() {
        let id = port_id();
        let ep = Endpoint::Vmnic(VmnicId::new().unwrap());

        let s = PortState::Unbound.connect(id, ep).unwrap();
        assert_eq!(s, PortState::Bound(ep));
        let s = s.disconnect(id).unwrap();
        assert_eq!(s, PortState::Unbound);
        let s = s.connect(id, ep).unwrap().disconnect(id).unwrap();
        assert_eq!(s.remove(id).unwrap(), PortState::Removed);
    }

    #[test]
    fn port_refusals() {
        let id = port_id();
        let ep = Endpoint::Vmnic(VmnicId::new().unwrap());
        let other = Endpoint::Ethlink(EthlinkId::new().unwrap());

        let err = PortState::Unbound.disconnect(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = PortState::Bound(ep).remove(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InUse);

        let err = PortState::Bound(ep).connect(id, other).unwrap_err();
        assert!(matches!(
            err,
            Error::PortAlreadyBound { endpoint, .. } if endpoint == ep
        ));

        let err = PortState::Removed.connect(id, ep).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn switch_destroy_needs_zero_ports() {
        let id = SwitchId::new().unwrap();

        let err = SwitchState::Active.destroy(id, 2).unwrap_err();
        assert!(matches!(err, Error::SwitchInUse { ports: 2, .. }));

        let s = SwitchState::Active.destroy(id, 0).unwrap();
        assert_eq!(s, SwitchState::Destroying);
        assert_eq!(s.destroyed(), SwitchState::Destroyed);
    }

    #[test]
    fn endpoint_lifecycle() {
        let p = port_id();
        let nic = VmnicId::new().unwrap();
        let ep = Endpoint::Vmnic(nic);

        let s = EndpointLifecycle::Created.connect(ep, p).unwrap();
        assert_eq!(s, EndpointLifecycle::Connected(p));

        let err = s.destroy(ep).unwrap_err();
        assert!(matches!(
            err,
            Error::VmnicInUse { id, port } if id == nic && port == p
        ));

        let err = s.connect(ep, port_id()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let s = s.disconnect();
        assert_eq!(s, EndpointLifecycle::Disconnected);
        assert_eq!(s.destroy(ep).unwrap(), EndpointLifecycle::Destroyed);
    }

    #[test]
    fn back_reference_wins() {
        let p = port_id();
        assert_eq!(
            EndpointLifecycle::from_parts(EndpointState::Created, Some(p)),
            EndpointLifecycle::Connected(p)
        );
        assert_eq!(
            EndpointLifecycle::from_parts(EndpointState::Connected, None),
            EndpointLifecycle::Disconnected
        );
    }
}
