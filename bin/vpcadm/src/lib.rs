// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! VPC switch administration library

use vpc::api::API_VERSION;
use vpc::api::MAJOR_VERSION;

pub mod cmd;
pub mod config;
pub mod logging;
pub mod zfs;

/// The version string reported by `vpcadm --version`.
pub fn vpcadm_pkg_version() -> String {
    format!("{MAJOR_VERSION}.{API_VERSION}.{}", env!("CARGO_PKG_VERSION_PATCH"))
}
