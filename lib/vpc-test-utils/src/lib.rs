// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod mem_table;
pub mod mem_volumes;

pub use mem_table::MemTable;
pub use mem_volumes::MemVolumes;
pub use mem_volumes::VolumeCall;

// Let's make our lives easier and pub use a bunch of stuff.
pub use vpc::Error;
pub use vpc::ErrorKind;
pub use vpc::NewVmnic;
pub use vpc::Topology;
pub use vpc::api::Endpoint;
pub use vpc::api::EndpointState;
pub use vpc::api::EthlinkId;
pub use vpc::api::ListFilter;
pub use vpc::api::MacAddr;
pub use vpc::api::PortId;
pub use vpc::api::ResourceKind;
pub use vpc::api::SwitchId;
pub use vpc::api::VmnicId;
pub use vpc::api::Vni;
pub use vpc::api::VpcCmd;
pub use vpc::api::VpcError;

use slog::Logger;
use slog::o;

/// A logger which drops everything.
pub fn test_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// A fresh engine over an empty [`MemTable`].
pub fn mem_topology() -> Topology<MemTable> {
    Topology::new(MemTable::new(), test_logger())
}

pub fn vni(n: u32) -> Vni {
    Vni::new(n).unwrap()
}

/// A default vmnic request: driver-chosen MAC, one queue.
pub fn new_vmnic() -> NewVmnic {
    NewVmnic {
        id: None,
        driver: "virtio-net".to_string(),
        queues: 1,
        mac: None,
        devname: None,
    }
}

/// Assert that an expression fails with the given [`ErrorKind`].
#[macro_export]
macro_rules! assert_kind {
    ($res:expr, $kind:expr) => {
        match $res {
            Ok(v) => panic!("expected {:?}, got Ok({:?})", $kind, v),
            Err(e) => assert_eq!(
                e.kind(),
                $kind,
                "expected {:?}, got {:?}: {}",
                $kind,
                e.kind(),
                e
            ),
        }
    };
}
