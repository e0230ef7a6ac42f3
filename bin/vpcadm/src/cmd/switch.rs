// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! `vpcadm switch`

use super::Ctx;
use super::Step;
use super::parse_id;
use super::parse_opt_id;
use crate::cmd::CmdError;
use vpc::api::ListFilter;
use vpc::api::SwitchId;
use vpc::api::SwitchInfo;
use vpc::api::Vni;
use vpc::table::ResourceTable;
use vpc::volume::VolumeManager;

#[derive(Clone, Debug, Default)]
pub struct CreateArgs {
    pub vni: u32,
    pub switch_id: Option<String>,
    /// Defaults to `vpcsw<vni>`.
    pub name: Option<String>,
}

pub fn create<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    args: &CreateArgs,
) -> Result<SwitchInfo, CmdError> {
    const STEP: &str = "switch create";

    let vni = Vni::new(args.vni)
        .map_err(|e| vpc::Error::invalid("VNI", e))
        .step(STEP)?;
    let id = parse_opt_id::<SwitchId>(args.switch_id.as_deref()).step(STEP)?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => format!("vpcsw{vni}"),
    };

    ctx.require_root(STEP)?;
    ctx.topology().create_switch(&name, vni, id).step(STEP)
}

pub fn destroy<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    switch_id: &str,
) -> Result<SwitchId, CmdError> {
    const STEP: &str = "switch destroy";

    let id = parse_id::<SwitchId>(switch_id).step(STEP)?;
    ctx.require_root(STEP)?;
    ctx.topology().destroy_switch(id).step(STEP)?;
    Ok(id)
}

pub fn list<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
) -> Result<Vec<SwitchInfo>, CmdError> {
    ctx.topology().list::<SwitchInfo>(&ListFilter::All).step("switch list")
}
