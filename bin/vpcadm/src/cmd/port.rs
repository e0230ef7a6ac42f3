// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! `vpcadm switch port`

use super::Ctx;
use super::Step;
use super::parse_id;
use super::parse_opt_id;
use crate::cmd::CmdError;
use serde::Serialize;
use slog::info;
use uuid::Uuid;
use vpc::api::Endpoint;
use vpc::api::EndpointState;
use vpc::api::EthlinkId;
use vpc::api::EthlinkInfo;
use vpc::api::ListFilter;
use vpc::api::PortId;
use vpc::api::PortInfo;
use vpc::api::SwitchId;
use vpc::table::ResourceTable;
use vpc::volume::VolumeManager;

#[derive(Clone, Debug, Default)]
pub struct AddArgs {
    pub switch_id: String,
    pub port_id: Option<String>,
    pub uplink: bool,
    /// Host link to attach an uplink port to.
    pub l2_name: Option<String>,
    pub ethlink_id: Option<String>,
}

/// The result of `port add`.
#[derive(Clone, Debug, Serialize)]
pub struct Added {
    pub port: PortInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethlink: Option<EthlinkInfo>,
}

/// Add a port to a switch.
///
/// With `--l2-name` the port is an uplink: after the port is added
/// the named link's ethlink is created if absent, and the port is
/// connected to it. A failure in a later step leaves the earlier
/// steps' resources in place.
pub fn add<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    args: &AddArgs,
) -> Result<Added, CmdError> {
    const STEP: &str = "port add";

    let switch_id = parse_id::<SwitchId>(&args.switch_id).step(STEP)?;
    let port_id = parse_opt_id::<PortId>(args.port_id.as_deref()).step(STEP)?;
    let ethlink_id =
        parse_opt_id::<EthlinkId>(args.ethlink_id.as_deref()).step(STEP)?;

    if args.l2_name.is_some() && !args.uplink {
        return Err(vpc::Error::invalid("--l2-name", "requires --uplink"))
            .step(STEP);
    }

    if ethlink_id.is_some() && args.l2_name.is_none() {
        return Err(vpc::Error::invalid("--ethlink-id", "requires --l2-name"))
            .step(STEP);
    }

    ctx.require_root(STEP)?;
    let topo = ctx.topology();
    let port = topo.add_port(switch_id, port_id, args.uplink).step(STEP)?;

    let Some(l2_name) = &args.l2_name else {
        return Ok(Added { port, ethlink: None });
    };

    let link = attach_ethlink(ctx, l2_name, ethlink_id)
        .step("port add: create ethlink")?;
    let port = topo
        .connect_port(port.id, Endpoint::Ethlink(link.id))
        .step("port add: connect uplink")?;
    let link = EthlinkInfo {
        port: Some(port.id),
        state: EndpointState::Connected,
        ..link
    };

    info!(
        ctx.log(),
        "uplink attached";
        "port_id" => %port.id,
        "ethlink_id" => %link.id,
        "l2_name" => &link.link_name,
    );
    Ok(Added { port, ethlink: Some(link) })
}

/// Find or create the ethlink for `l2_name`.
fn attach_ethlink<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    l2_name: &str,
    id: Option<EthlinkId>,
) -> Result<EthlinkInfo, vpc::Error> {
    let topo = ctx.topology();

    if let Some(id) = id {
        return match topo.get_ethlink(id) {
            Ok(link) if link.link_name == l2_name => Ok(link),
            Ok(link) => Err(vpc::Error::invalid(
                "--ethlink-id",
                format!(
                    "ethlink {id} is attached to {}, not {l2_name}",
                    link.link_name
                ),
            )),
            Err(vpc::Error::NotFound { .. }) => {
                topo.create_ethlink(l2_name, Some(id))
            }
            Err(e) => Err(e),
        };
    }

    let existing =
        topo.list::<EthlinkInfo>(&ListFilter::LinkName(l2_name.to_string()))?;
    match existing.into_iter().find(|l| l.live) {
        Some(link) => Ok(link),
        None => topo.create_ethlink(l2_name, None),
    }
}

pub fn remove<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    port_id: &str,
    switch_id: Option<&str>,
) -> Result<PortId, CmdError> {
    const STEP: &str = "port remove";

    let id = parse_id::<PortId>(port_id).step(STEP)?;
    let switch_id = parse_opt_id::<SwitchId>(switch_id).step(STEP)?;
    ctx.require_root(STEP)?;
    ctx.topology().remove_port(id, switch_id).step(STEP)?;
    Ok(id)
}

/// Connect a port to the vmnic or ethlink named by `interface_id`.
pub fn connect<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    port_id: &str,
    interface_id: &str,
) -> Result<PortInfo, CmdError> {
    const STEP: &str = "port connect";

    let id = parse_id::<PortId>(port_id).step(STEP)?;
    let interface = parse_id::<Uuid>(interface_id).step(STEP)?;
    ctx.require_root(STEP)?;

    let topo = ctx.topology();
    let endpoint = topo.resolve_endpoint(interface).step(STEP)?;
    topo.connect_port(id, endpoint).step(STEP)
}

pub fn disconnect<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    port_id: &str,
    interface_id: Option<&str>,
) -> Result<PortInfo, CmdError> {
    const STEP: &str = "port disconnect";

    let id = parse_id::<PortId>(port_id).step(STEP)?;
    let interface = parse_opt_id::<Uuid>(interface_id).step(STEP)?;
    ctx.require_root(STEP)?;

    let topo = ctx.topology();
    let expected = interface
        .map(|raw| topo.resolve_endpoint(raw))
        .transpose()
        .step(STEP)?;
    topo.disconnect_port(id, expected).step(STEP)
}

pub fn list<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    switch_id: Option<&str>,
) -> Result<Vec<PortInfo>, CmdError> {
    const STEP: &str = "port list";

    let filter = match parse_opt_id::<SwitchId>(switch_id).step(STEP)? {
        Some(id) => ListFilter::Switch(id),
        None => ListFilter::All,
    };
    ctx.topology().list::<PortInfo>(&filter).step(STEP)
}
