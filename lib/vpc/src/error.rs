// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Errors returned by the topology engine.

use crate::api::Endpoint;
use crate::api::EthlinkId;
use crate::api::IdError;
use crate::api::PortId;
use crate::api::ResourceKind;
use crate::api::SwitchId;
use crate::api::Vni;
use crate::api::VmnicId;
use crate::api::VpcError;
use crate::volume::VolumeError;
use core::fmt;
use core::fmt::Display;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// The class of an engine failure.
///
/// Every [`Error`] belongs to exactly one kind. The kind tells the
/// operator what to do next; the error itself tells them why.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Malformed identifier, missing or conflicting attribute, or an
    /// operation that makes no sense for the resource's current
    /// state.
    InvalidInput,
    /// The referenced resource does not exist.
    NotFound,
    /// A uniqueness rule would be broken: duplicate VNI, duplicate
    /// identifier, or an endpoint/link already claimed.
    Conflict,
    /// The resource still has live dependents.
    InUse,
    /// The driver, or another system facility, could not be used.
    DriverUnavailable,
    /// The caller lacks the privilege for the operation.
    PermissionDenied,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::InvalidInput => "InvalidInput",
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::InUse => "InUse",
            Self::DriverUnavailable => "DriverUnavailable",
            Self::PermissionDenied => "PermissionDenied",
        };
        write!(f, "{s}")
    }
}

impl From<&VpcError> for ErrorKind {
    fn from(e: &VpcError) -> Self {
        match e {
            VpcError::NotFound { .. } => Self::NotFound,
            VpcError::Conflict(_) => Self::Conflict,
            VpcError::InUse { .. } => Self::InUse,
            VpcError::Invalid(_) | VpcError::NoRequestBody => {
                Self::InvalidInput
            }
            VpcError::PermissionDenied(_) => Self::PermissionDenied,
            VpcError::System { errno, .. }
                if *errno == libc::EPERM || *errno == libc::EACCES =>
            {
                Self::PermissionDenied
            }
            VpcError::Unavailable(_)
            | VpcError::BadApiVersion { .. }
            | VpcError::CopyinReq
            | VpcError::CopyoutResp
            | VpcError::DeserCmdErr(_)
            | VpcError::DeserCmdReq(_)
            | VpcError::RespTooLarge { .. }
            | VpcError::SerCmdErr(_)
            | VpcError::SerCmdResp(_)
            | VpcError::System { .. } => Self::DriverUnavailable,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Identity(#[from] IdError),

    #[error("invalid {what}: {reason}")]
    InvalidInput { what: &'static str, reason: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: Uuid },

    #[error("{kind} {id} already exists")]
    IdCollision { kind: ResourceKind, id: Uuid },

    #[error("VNI {vni} is already in use by switch {switch_id}")]
    VniInUse { vni: Vni, switch_id: SwitchId },

    #[error("switch {id} still owns {ports} port(s)")]
    SwitchInUse { id: SwitchId, ports: usize },

    #[error("port {id} is connected to {endpoint}; disconnect it first")]
    PortBound { id: PortId, endpoint: Endpoint },

    #[error("port {id} is not connected")]
    PortUnbound { id: PortId },

    #[error("port {id} is already connected to {endpoint}")]
    PortAlreadyBound { id: PortId, endpoint: Endpoint },

    #[error("{endpoint} is already connected to port {port}")]
    EndpointBound { endpoint: Endpoint, port: PortId },

    #[error("port {port} (uplink: {uplink}) cannot connect to {endpoint}")]
    EndpointKindMismatch { port: PortId, uplink: bool, endpoint: Endpoint },

    #[error("port {port} belongs to switch {actual}, not {expected}")]
    WrongSwitch { port: PortId, expected: SwitchId, actual: SwitchId },

    #[error("port {port} is connected to {actual}, not {expected}")]
    WrongEndpoint { port: PortId, expected: Endpoint, actual: Endpoint },

    #[error("{id} names both a vmnic and an ethlink")]
    AmbiguousEndpoint { id: Uuid },

    #[error("ethlink {id} is connected to port {port}; disconnect it first")]
    EthlinkInUse { id: EthlinkId, port: PortId },

    #[error("vmnic {id} is connected to port {port}; disconnect it first")]
    VmnicInUse { id: VmnicId, port: PortId },

    #[error("link {link_name} already backs live ethlink {id}")]
    LinkInUse { link_name: String, id: EthlinkId },

    #[error("{op}: {source}")]
    Driver {
        op: &'static str,
        #[source]
        source: VpcError,
    },

    #[error("driver answered a {want} request with a {got}")]
    UnexpectedState { want: ResourceKind, got: ResourceKind },

    #[error(transparent)]
    Storage(#[from] VolumeError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use ErrorKind::*;

        match self {
            Self::Identity(IdError::Invalid { .. }) => InvalidInput,
            // The OS entropy source is a system facility that could
            // not be used, the same class as an unreachable driver.
            Self::Identity(IdError::Entropy(_)) => DriverUnavailable,
            Self::InvalidInput { .. } => InvalidInput,
            Self::NotFound { .. } => NotFound,
            Self::IdCollision { .. } => Conflict,
            Self::VniInUse { .. } => Conflict,
            Self::SwitchInUse { .. } => InUse,
            Self::PortBound { .. } => InUse,
            Self::PortUnbound { .. } => InvalidInput,
            Self::PortAlreadyBound { .. } => InvalidInput,
            Self::EndpointBound { .. } => Conflict,
            Self::EndpointKindMismatch { .. } => InvalidInput,
            Self::WrongSwitch { .. } => InvalidInput,
            Self::WrongEndpoint { .. } => InvalidInput,
            Self::AmbiguousEndpoint { .. } => Conflict,
            Self::EthlinkInUse { .. } => InUse,
            Self::VmnicInUse { .. } => InUse,
            Self::LinkInUse { .. } => Conflict,
            Self::Driver { source, .. } => ErrorKind::from(source),
            Self::UnexpectedState { .. } => DriverUnavailable,
            Self::Storage(_) => DriverUnavailable,
        }
    }

    pub fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput { what, reason: reason.into() }
    }

    /// Wrap an error reported by the resource table for `op`.
    ///
    /// A `NotFound` from the driver is lifted into [`Error::NotFound`]
    /// so callers match on one variant regardless of where the
    /// absence was noticed.
    pub(crate) fn driver(op: &'static str, e: VpcError) -> Self {
        match e {
            VpcError::NotFound { kind, id } => Self::NotFound { kind, id },
            source => Self::Driver { op, source },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn driver_errors_keep_their_kind() {
        let cases = [
            (VpcError::Conflict("endpoint bound".into()), ErrorKind::Conflict),
            (
                VpcError::InUse {
                    kind: ResourceKind::Switch,
                    id: Uuid::nil(),
                    reason: "ports".into(),
                },
                ErrorKind::InUse,
            ),
            (VpcError::Invalid("vni".into()), ErrorKind::InvalidInput),
            (
                VpcError::Unavailable("ENXIO".into()),
                ErrorKind::DriverUnavailable,
            ),
            (
                VpcError::PermissionDenied("uid 1000".into()),
                ErrorKind::PermissionDenied,
            ),
            (
                VpcError::System { errno: libc::EPERM, msg: "EPERM".into() },
                ErrorKind::PermissionDenied,
            ),
            (
                VpcError::BadApiVersion { user: 1, kernel: 2 },
                ErrorKind::DriverUnavailable,
            ),
        ];

        for (e, kind) in cases {
            assert_eq!(Error::driver("bind", e).kind(), kind);
        }
    }

    #[test]
    fn driver_not_found_is_lifted() {
        let e = Error::driver(
            "get",
            VpcError::NotFound { kind: ResourceKind::Port, id: Uuid::nil() },
        );
        assert!(matches!(
            e,
            Error::NotFound { kind: ResourceKind::Port, .. }
        ));
        assert_eq!(e.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn bad_identity_is_invalid_input() {
        let e: Error = crate::api::parse_id::<PortId>("p1").unwrap_err().into();
        assert_eq!(e.kind(), ErrorKind::InvalidInput);
    }
}
