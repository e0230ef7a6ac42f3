// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::API_VERSION;
use super::ResourceKind;
use super::id::PortId;
use super::id::VmnicId;
use super::resource::Endpoint;
use super::resource::ListFilter;
use super::resource::ResourceSpec;
use super::resource::ResourceState;
use super::resource::VmnicInfo;
use core::fmt::Debug;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

pub const VPC_IOC: u32 = 0x76706300;
pub const VPC_IOC_CMD: i32 = VPC_IOC as i32 | 0x01;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum VpcCmd {
    Create = 1,          // create a resource of any kind
    Get = 2,             // fetch one resource
    List = 3,            // list resources of one kind
    Destroy = 4,         // destroy a resource
    Bind = 10,           // connect a port to an endpoint
    Unbind = 11,         // disconnect a port from its endpoint
    SetVmnicQueues = 20, // change a vmnic's queue count
}

impl TryFrom<i32> for VpcCmd {
    type Error = ();

    fn try_from(num: i32) -> Result<Self, Self::Error> {
        match num {
            1 => Ok(Self::Create),
            2 => Ok(Self::Get),
            3 => Ok(Self::List),
            4 => Ok(Self::Destroy),
            10 => Ok(Self::Bind),
            11 => Ok(Self::Unbind),
            20 => Ok(Self::SetVmnicQueues),
            _ => Err(()),
        }
    }
}

/// Indicates that a command response has been written to the response
/// buffer (`resp_bytes`).
pub const VPC_CMD_RESP_COPY_OUT: u64 = 0x1;

/// The `ioctl(2)` argument passed when sending a `VpcCmd`.
///
/// We need `repr(C)` for a stable layout across compilations. The
/// command's actual request/response data is serialized by postcard
/// into the user supplied buffers in `req_bytes`/`resp_bytes`.
#[derive(Debug)]
#[repr(C)]
pub struct VpcCmdIoctl {
    pub api_version: u64,
    pub cmd: VpcCmd,
    pub flags: u64,
    // Reserve some additional bytes in case we need them in the
    // future.
    pub reserved1: u64,
    pub req_bytes: *const u8,
    pub req_len: usize,
    pub resp_bytes: *mut u8,
    pub resp_len: usize,
    pub resp_len_actual: usize,
}

impl VpcCmdIoctl {
    pub fn cmd_err_resp(&self) -> Option<VpcError> {
        if self.has_cmd_resp() {
            // Safety: We know the resp_bytes point to a Vec and that
            // resp_len_actual is within range.
            let resp = unsafe {
                core::slice::from_raw_parts(
                    self.resp_bytes,
                    self.resp_len_actual,
                )
            };

            match postcard::from_bytes(resp) {
                Ok(cmd_err) => Some(cmd_err),
                Err(deser_err) => {
                    Some(VpcError::DeserCmdErr(deser_err.to_string()))
                }
            }
        } else {
            None
        }
    }

    fn has_cmd_resp(&self) -> bool {
        (self.flags & VPC_CMD_RESP_COPY_OUT) != 0
    }

    /// Is this the expected API version?
    pub fn check_version(&self) -> bool {
        self.api_version == API_VERSION
    }
}

/// Errors reported by the switch driver.
///
/// The first group mirrors the resource-table outcomes every command
/// may produce; the remainder describe failures of the ioctl
/// plumbing itself.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum VpcError {
    NotFound {
        kind: ResourceKind,
        id: Uuid,
    },
    /// A uniqueness constraint would be violated, e.g. a duplicate
    /// identifier or a second bind of an endpoint.
    Conflict(String),
    /// The resource is still referenced by another resource.
    InUse {
        kind: ResourceKind,
        id: Uuid,
        reason: String,
    },
    Invalid(String),
    /// The driver could not be reached, or gave no usable answer.
    Unavailable(String),
    PermissionDenied(String),

    BadApiVersion {
        user: u64,
        kernel: u64,
    },
    CopyinReq,
    CopyoutResp,
    DeserCmdErr(String),
    DeserCmdReq(String),
    NoRequestBody,
    RespTooLarge {
        needed: usize,
        given: usize,
    },
    SerCmdErr(String),
    SerCmdResp(String),
    System {
        errno: i32,
        msg: String,
    },
}

impl VpcError {
    /// Convert to an errno value.
    ///
    /// NOTE: Only `RespTooLarge` may use `ENOBUFS`; the client treats
    /// that errno as a request to grow its response buffer.
    pub fn to_errno(&self) -> i32 {
        use libc::*;

        match self {
            Self::NotFound { .. } => ENOENT,
            Self::Conflict(_) => EEXIST,
            Self::InUse { .. } => EBUSY,
            Self::Invalid(_) => EINVAL,
            Self::Unavailable(_) => ENXIO,
            Self::PermissionDenied(_) => EPERM,
            Self::BadApiVersion { .. } => EPROTO,
            Self::CopyinReq => EFAULT,
            Self::CopyoutResp => EFAULT,
            Self::DeserCmdErr(_) => ENOMSG,
            Self::DeserCmdReq(_) => ENOMSG,
            Self::NoRequestBody => EINVAL,
            Self::RespTooLarge { .. } => ENOBUFS,
            Self::SerCmdErr(_) => ENOMSG,
            Self::SerCmdResp(_) => ENOMSG,
            Self::System { errno, .. } => *errno,
        }
    }
}

impl core::fmt::Display for VpcError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} {id} not found"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::InUse { kind, id, reason } => {
                write!(f, "{kind} {id} is in use: {reason}")
            }
            Self::Invalid(msg) => write!(f, "invalid request: {msg}"),
            Self::Unavailable(msg) => write!(f, "driver unavailable: {msg}"),
            Self::PermissionDenied(msg) => {
                write!(f, "permission denied: {msg}")
            }
            Self::BadApiVersion { user, kernel } => write!(
                f,
                "API version mismatch: user {user}, kernel {kernel}"
            ),
            Self::System { errno, msg } => {
                write!(f, "system error {errno}: {msg}")
            }
            other => write!(f, "{other:?}"),
        }
    }
}

impl std::error::Error for VpcError {}

/// A marker trait indicating a success response type that is returned
/// from a command and may be passed across the ioctl/API boundary.
pub trait CmdOk: Debug + Serialize {}

impl CmdOk for () {}

impl CmdOk for ResourceState {}

impl CmdOk for VmnicInfo {}

/// Indicates no meaningful response value on success.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NoResp {
    pub unused: u64,
}

impl CmdOk for NoResp {}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateReq {
    pub spec: ResourceSpec,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetReq {
    pub kind: ResourceKind,
    pub id: Uuid,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ListReq {
    pub kind: ResourceKind,
    pub filter: ListFilter,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ListResp {
    pub resources: Vec<ResourceState>,
}

impl CmdOk for ListResp {}

#[derive(Debug, Deserialize, Serialize)]
pub struct DestroyReq {
    pub kind: ResourceKind,
    pub id: Uuid,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BindReq {
    pub port_id: PortId,
    pub endpoint: Endpoint,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UnbindReq {
    pub port_id: PortId,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SetVmnicQueuesReq {
    pub id: VmnicId,
    pub queues: u16,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cmd_numbers_round_trip() {
        for cmd in [
            VpcCmd::Create,
            VpcCmd::Get,
            VpcCmd::List,
            VpcCmd::Destroy,
            VpcCmd::Bind,
            VpcCmd::Unbind,
            VpcCmd::SetVmnicQueues,
        ] {
            assert_eq!(VpcCmd::try_from(cmd as i32), Ok(cmd));
        }
        assert!(VpcCmd::try_from(99).is_err());
    }

    #[test]
    fn only_resp_too_large_uses_enobufs() {
        let errs = [
            VpcError::NotFound { kind: ResourceKind::Port, id: Uuid::nil() },
            VpcError::Conflict("dup".into()),
            VpcError::Unavailable("down".into()),
            VpcError::System { errno: libc::EIO, msg: "io".into() },
        ];
        for e in errs {
            assert_ne!(e.to_errno(), libc::ENOBUFS);
        }
        assert_eq!(
            VpcError::RespTooLarge { needed: 2, given: 1 }.to_errno(),
            libc::ENOBUFS
        );
    }

    #[test]
    fn error_survives_postcard() {
        let err = VpcError::InUse {
            kind: ResourceKind::Switch,
            id: Uuid::nil(),
            reason: "2 ports".into(),
        };
        let bytes = postcard::to_allocvec(&err).unwrap();
        let back: VpcError = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, err);
    }
}
