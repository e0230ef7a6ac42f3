// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The VPC topology engine.
//!
//! A [`Topology`] enforces the structural rules of a virtual L2
//! fabric (switches, their ports, and the vmnics and ethlinks those
//! ports connect to) on top of a [`table::ResourceTable`], the
//! privileged driver that owns the authoritative state. The engine
//! keeps no copy of that state between calls: every check is made
//! against a fresh answer from the driver, and the driver remains
//! the final arbiter of any race between concurrent callers.

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

pub mod error;
pub mod inspect;
pub mod print;
pub mod resource;
pub mod state;
pub mod table;
pub mod topology;
pub mod volume;

pub use error::Error;
pub use error::ErrorKind;
pub use topology::NewVmnic;
pub use topology::Topology;

/// Re-export the API types so consumers need only depend on `vpc`.
pub mod api {
    pub use vpc_api::*;
}
