// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! `vpcadm ethlink`

use super::Ctx;
use super::Step;
use super::parse_id;
use super::parse_opt_id;
use crate::cmd::CmdError;
use vpc::api::EthlinkId;
use vpc::api::EthlinkInfo;
use vpc::api::ListFilter;
use vpc::table::ResourceTable;
use vpc::volume::VolumeManager;

pub fn create<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    l2_name: &str,
    ethlink_id: Option<&str>,
) -> Result<EthlinkInfo, CmdError> {
    const STEP: &str = "ethlink create";

    let id = parse_opt_id::<EthlinkId>(ethlink_id).step(STEP)?;
    ctx.require_root(STEP)?;
    ctx.topology().create_ethlink(l2_name, id).step(STEP)
}

pub fn destroy<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    ethlink_id: &str,
) -> Result<EthlinkId, CmdError> {
    const STEP: &str = "ethlink destroy";

    let id = parse_id::<EthlinkId>(ethlink_id).step(STEP)?;
    ctx.require_root(STEP)?;
    ctx.topology().destroy_ethlink(id).step(STEP)?;
    Ok(id)
}

pub fn list<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    l2_name: Option<&str>,
) -> Result<Vec<EthlinkInfo>, CmdError> {
    let filter = match l2_name {
        Some(name) => ListFilter::LinkName(name.to_string()),
        None => ListFilter::All,
    };
    ctx.topology().list::<EthlinkInfo>(&filter).step("ethlink list")
}
