// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use thiserror::Error;
use uuid::Uuid;
use vpc::api::API_VERSION;
use vpc::api::BindReq;
use vpc::api::CmdOk;
use vpc::api::CreateReq;
use vpc::api::DestroyReq;
use vpc::api::Endpoint;
use vpc::api::GetReq;
use vpc::api::ListFilter;
use vpc::api::ListReq;
use vpc::api::ListResp;
use vpc::api::NoResp;
use vpc::api::PortId;
use vpc::api::ResourceKind;
use vpc::api::ResourceSpec;
use vpc::api::ResourceState;
use vpc::api::SetVmnicQueuesReq;
use vpc::api::UnbindReq;
use vpc::api::VPC_IOC_CMD;
use vpc::api::VmnicId;
use vpc::api::VmnicInfo;
use vpc::api::VpcCmd;
use vpc::api::VpcCmdIoctl;
pub use vpc::api::VpcError;
use vpc::table::ResourceTable;

/// Errors related to talking to the VPC switch driver.
#[derive(Debug, Error)]
pub enum Error {
    #[error("VPC switch driver is not attached")]
    DriverNotAttached,

    #[error("error interacting with device: {0}")]
    Io(std::io::Error),

    /// Something in the driver's ioctl(2) handler failed.
    #[error("ioctl {0:?} failed: {2}")]
    IoctlFailed(VpcCmd, i32, String),

    #[error("request serialization failed for command {0:?}: {1}")]
    ReqSer(VpcCmd, postcard::Error),

    #[error("response deserialization failed for command {0:?}: {1}")]
    RespDeser(VpcCmd, postcard::Error),

    #[error(
        "driver reported a {0}-byte response for command {1:?} into a \
         {2}-byte buffer"
    )]
    RespOverrun(usize, VpcCmd, usize),

    #[error("failed to get response for command {0:?} in {1} attempts")]
    MaxAttempts(VpcCmd, u8),

    #[error("command {0:?} failed: {1}")]
    CommandError(VpcCmd, VpcError),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Error::DriverNotAttached,
            _ => Error::Io(e),
        }
    }
}

impl From<Error> for VpcError {
    /// Fold a transport failure into the driver's error vocabulary.
    ///
    /// Errors the driver itself reported pass through untouched.
    /// Everything else means the driver could not be used, except a
    /// refusal on privilege.
    fn from(e: Error) -> Self {
        match e {
            Error::CommandError(_, err) => err,
            Error::IoctlFailed(_, libc::EPERM | libc::EACCES, msg) => {
                VpcError::PermissionDenied(msg)
            }
            Error::Io(io)
                if io.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                VpcError::PermissionDenied(io.to_string())
            }
            other => VpcError::Unavailable(other.to_string()),
        }
    }
}

/// The handle used to send commands to the VPC switch driver.
#[derive(Debug)]
pub struct VpcHdl {
    device: File,
}

impl VpcHdl {
    pub const CTL: &'static str = "/dev/vpcctl";

    pub fn open_on(what: &str) -> Result<Self, Error> {
        Ok(VpcHdl {
            device: OpenOptions::new().read(true).write(true).open(what)?,
        })
    }

    pub fn open() -> Result<Self, Error> {
        Self::open_on(Self::CTL)
    }

    pub fn create_resource(
        &self,
        spec: &ResourceSpec,
    ) -> Result<ResourceState, Error> {
        let req = CreateReq { spec: spec.clone() };
        run_cmd_ioctl(self.device.as_raw_fd(), VpcCmd::Create, Some(&req))
    }

    pub fn get_resource(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<ResourceState, Error> {
        let req = GetReq { kind, id };
        run_cmd_ioctl(self.device.as_raw_fd(), VpcCmd::Get, Some(&req))
    }

    pub fn list_resources(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<ListResp, Error> {
        let req = ListReq { kind, filter: filter.clone() };
        run_cmd_ioctl(self.device.as_raw_fd(), VpcCmd::List, Some(&req))
    }

    pub fn destroy_resource(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<NoResp, Error> {
        let req = DestroyReq { kind, id };
        run_cmd_ioctl(self.device.as_raw_fd(), VpcCmd::Destroy, Some(&req))
    }

    pub fn bind_port(
        &self,
        port_id: PortId,
        endpoint: Endpoint,
    ) -> Result<NoResp, Error> {
        let req = BindReq { port_id, endpoint };
        run_cmd_ioctl(self.device.as_raw_fd(), VpcCmd::Bind, Some(&req))
    }

    pub fn unbind_port(&self, port_id: PortId) -> Result<NoResp, Error> {
        let req = UnbindReq { port_id };
        run_cmd_ioctl(self.device.as_raw_fd(), VpcCmd::Unbind, Some(&req))
    }

    pub fn set_queues(
        &self,
        id: VmnicId,
        queues: u16,
    ) -> Result<VmnicInfo, Error> {
        let req = SetVmnicQueuesReq { id, queues };
        run_cmd_ioctl(
            self.device.as_raw_fd(),
            VpcCmd::SetVmnicQueues,
            Some(&req),
        )
    }
}

impl ResourceTable for VpcHdl {
    fn create(&self, spec: &ResourceSpec) -> Result<ResourceState, VpcError> {
        Ok(self.create_resource(spec)?)
    }

    fn get(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<ResourceState, VpcError> {
        Ok(self.get_resource(kind, id)?)
    }

    fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<ResourceState>, VpcError> {
        Ok(self.list_resources(kind, filter)?.resources)
    }

    fn destroy(&self, kind: ResourceKind, id: Uuid) -> Result<(), VpcError> {
        self.destroy_resource(kind, id)?;
        Ok(())
    }

    fn bind(&self, port: PortId, endpoint: Endpoint) -> Result<(), VpcError> {
        self.bind_port(port, endpoint)?;
        Ok(())
    }

    fn unbind(&self, port: PortId) -> Result<(), VpcError> {
        self.unbind_port(port)?;
        Ok(())
    }

    fn set_vmnic_queues(
        &self,
        id: VmnicId,
        queues: u16,
    ) -> Result<VmnicInfo, VpcError> {
        Ok(self.set_queues(id, queues)?)
    }
}

pub fn run_cmd_ioctl<T, R>(
    dev: libc::c_int,
    cmd: VpcCmd,
    req: Option<&R>,
) -> Result<T, Error>
where
    T: CmdOk + DeserializeOwned,
    R: Serialize,
{
    let req_bytes = match req {
        Some(req) => {
            let bytes = postcard::to_allocvec(req)
                .map_err(|e| Error::ReqSer(cmd, e))?;
            // Every request type carries at least a kind tag or an
            // identifier, so an empty encoding is a caller bug.
            debug_assert!(!bytes.is_empty(), "cannot use ZST for request type");
            Some(bytes)
        }

        None => None,
    };

    let (req_bytes_ptr, req_len) = match &req_bytes {
        Some(bytes) => (bytes.as_ptr(), bytes.len()),
        None => (core::ptr::null(), 0),
    };

    // Leave enough room for the driver to serialize an error response
    // without a second round trip.
    const BASE_CAPACITY: usize = 16 * 1024;
    let mut resp_buf: Vec<u8> = Vec::with_capacity(BASE_CAPACITY);
    let mut rioctl = VpcCmdIoctl {
        api_version: API_VERSION,
        cmd,
        flags: 0,
        reserved1: 0,
        req_bytes: req_bytes_ptr,
        req_len,
        resp_bytes: resp_buf.as_mut_ptr(),
        resp_len: resp_buf.capacity(),
        resp_len_actual: 0,
    };

    const MAX_ITERATIONS: u8 = 3;
    for _ in 0..MAX_ITERATIONS {
        let ret =
            unsafe { ioctl(dev, VPC_IOC_CMD as libc::c_int, &mut rioctl) };

        if ret == -1 {
            let err = std::io::Error::last_os_error();
            let raw_err = err.raw_os_error().unwrap_or(libc::EIO);

            // The command ran, but the response does not fit. Grow the
            // buffer and send it again.
            if raw_err == libc::ENOBUFS {
                if rioctl.resp_len_actual <= resp_buf.capacity() {
                    return Err(Error::RespOverrun(
                        rioctl.resp_len_actual,
                        cmd,
                        resp_buf.capacity(),
                    ));
                }

                // Each retry reruns the command and the response may
                // change size in between; keep some headroom.
                let wanted_capacity =
                    BASE_CAPACITY / 4 + rioctl.resp_len_actual;

                resp_buf.reserve(wanted_capacity - resp_buf.len());
                rioctl.resp_bytes = resp_buf.as_mut_ptr();
                rioctl.resp_len = resp_buf.capacity();
                rioctl.resp_len_actual = 0;
                continue;
            }

            // A serialized error carries more context than errno;
            // prefer it when present.
            if let Some(cmd_err) = rioctl.cmd_err_resp() {
                return Err(Error::CommandError(cmd, cmd_err));
            }

            let msg = match raw_err {
                libc::EPROTO => "API version mismatch".to_string(),

                libc::EFAULT => "failed to copyin/copyout req/resp".to_string(),

                libc::ENOMSG => {
                    "vpc driver failed to deser/ser req/resp".to_string()
                }

                libc::EPERM => "permission denied".to_string(),

                errno => {
                    format!("unexpected errno: {errno}")
                }
            };

            return Err(Error::IoctlFailed(cmd, raw_err, msg));
        } else {
            if rioctl.resp_len_actual > resp_buf.capacity() {
                return Err(Error::RespOverrun(
                    rioctl.resp_len_actual,
                    cmd,
                    resp_buf.capacity(),
                ));
            }

            // Safety: the driver has promised that it populated
            // `resp_len_actual` bytes of the buffer we provided, and
            // that length is within capacity.
            unsafe {
                resp_buf.set_len(rioctl.resp_len_actual);
            }
            return postcard::from_bytes(&resp_buf)
                .map_err(|e| Error::RespDeser(cmd, e));
        }
    }

    Err(Error::MaxAttempts(cmd, MAX_ITERATIONS))
}

unsafe fn ioctl<T>(
    fd: libc::c_int,
    req: libc::c_int,
    arg: *mut T,
) -> libc::c_int {
    // Most other OSes define the request argument to be ulong_t rather than int
    // Cast that away here so that it compiles in both places
    #[cfg(not(target_os = "illumos"))]
    let req = req as libc::c_ulong;

    unsafe { libc::ioctl(fd, req, arg) }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_device_is_not_attached() {
        let err = VpcHdl::open_on("/nonexistent/vpcctl").unwrap_err();
        assert!(matches!(err, Error::DriverNotAttached));

        let e = VpcError::from(err);
        assert!(matches!(e, VpcError::Unavailable(_)));
        assert_eq!(vpc::ErrorKind::from(&e), vpc::ErrorKind::DriverUnavailable);
    }

    #[test]
    fn driver_errors_pass_through() {
        let inner = VpcError::Conflict("endpoint bound".into());
        let e =
            VpcError::from(Error::CommandError(VpcCmd::Bind, inner.clone()));
        assert_eq!(e, inner);
    }

    #[test]
    fn privilege_refusals_are_permission_denied() {
        let e = VpcError::from(Error::IoctlFailed(
            VpcCmd::Create,
            libc::EPERM,
            "permission denied".into(),
        ));
        assert!(matches!(e, VpcError::PermissionDenied(_)));

        let e = VpcError::from(Error::IoctlFailed(
            VpcCmd::Destroy,
            libc::EACCES,
            "access denied".into(),
        ));
        assert!(matches!(e, VpcError::PermissionDenied(_)));
        assert_eq!(
            vpc::ErrorKind::from(&e),
            vpc::ErrorKind::PermissionDenied
        );

        let e = VpcError::from(Error::MaxAttempts(VpcCmd::List, 3));
        assert!(matches!(e, VpcError::Unavailable(_)));
    }
}
