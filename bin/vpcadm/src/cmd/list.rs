// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! `vpcadm list`

use super::Ctx;
use super::Step;
use crate::cmd::CmdError;
use vpc::inspect::TopologySnapshot;
use vpc::table::ResourceTable;
use vpc::volume::VolumeManager;

/// Everything the driver knows about.
pub fn topology<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
) -> Result<TopologySnapshot, CmdError> {
    ctx.topology().snapshot().step("list")
}
