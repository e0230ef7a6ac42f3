// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! `vpcadm vmnic`

use super::Ctx;
use super::Step;
use super::parse_id;
use super::parse_opt_id;
use crate::cmd::CmdError;
use serde::Serialize;
use slog::info;
use uuid::Uuid;
use vpc::NewVmnic;
use vpc::api::ListFilter;
use vpc::api::MacAddr;
use vpc::api::VmnicId;
use vpc::api::VmnicInfo;
use vpc::table::ResourceTable;
use vpc::volume::GuestDatasets;
use vpc::volume::VolumeManager;
use vpc::volume::validate_size;

/// Where and how big to make a guest's storage.
#[derive(Clone, Debug)]
pub struct StorageArgs {
    pub dataset_root: String,
    pub disk_size: String,
    /// Defaults to the vmnic's id.
    pub vm_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CreateArgs {
    pub vmnic_id: Option<String>,
    pub driver: String,
    pub num_queues: u16,
    pub mac: Option<String>,
    pub devname: Option<String>,
    /// `None` skips storage provisioning.
    pub storage: Option<StorageArgs>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Created {
    pub vmnic: VmnicInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<GuestDatasets>,
}

/// Create a vmnic, provisioning its guest's storage first.
///
/// A storage failure stops the command before the driver is asked
/// for anything. A registration failure leaves the storage behind.
pub fn create<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    args: &CreateArgs,
) -> Result<Created, CmdError> {
    const STEP: &str = "vmnic create";

    let id = parse_opt_id::<VmnicId>(args.vmnic_id.as_deref()).step(STEP)?;
    let mac = args
        .mac
        .as_deref()
        .map(|raw| {
            raw.parse::<MacAddr>()
                .map_err(|e| vpc::Error::invalid("vmnic MAC", e))
        })
        .transpose()
        .step(STEP)?;

    let storage = match &args.storage {
        Some(s) => {
            validate_size(&s.disk_size)
                .map_err(|e| vpc::Error::invalid("disk size", e))
                .step(STEP)?;
            let vm_id = parse_opt_id::<Uuid>(s.vm_id.as_deref()).step(STEP)?;
            Some((s, vm_id))
        }
        None => None,
    };

    ctx.require_root(STEP)?;

    // The guest's datasets are named after the vmnic unless told
    // otherwise, so the id has to be settled before anything is
    // provisioned.
    let id = match id {
        Some(id) => id,
        None => VmnicId::new().map_err(vpc::Error::from).step(STEP)?,
    };

    let datasets = match storage {
        Some((s, vm_id)) => {
            let ds = GuestDatasets::new(
                &s.dataset_root,
                vm_id.unwrap_or_else(|| id.into()),
            );
            ds.provision(ctx.volumes(), &s.disk_size, ctx.log())
                .map_err(vpc::Error::from)
                .step("vmnic create: provision storage")?;
            Some(ds)
        }
        None => None,
    };

    let req = NewVmnic {
        id: Some(id),
        driver: args.driver.clone(),
        queues: args.num_queues,
        mac,
        devname: args.devname.clone(),
    };
    let vmnic = ctx
        .topology()
        .create_vmnic(req)
        .step("vmnic create: register vmnic")?;

    info!(
        ctx.log(),
        "vmnic ready";
        "vmnic_id" => %vmnic.id,
        "storage" => datasets.as_ref().map(|ds| ds.root.clone()),
    );
    Ok(Created { vmnic, storage: datasets })
}

pub fn destroy<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    vmnic_id: &str,
) -> Result<VmnicId, CmdError> {
    const STEP: &str = "vmnic destroy";

    let id = parse_id::<VmnicId>(vmnic_id).step(STEP)?;
    ctx.require_root(STEP)?;
    ctx.topology().destroy_vmnic(id).step(STEP)?;
    Ok(id)
}

pub fn get<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    vmnic_id: &str,
) -> Result<VmnicInfo, CmdError> {
    const STEP: &str = "vmnic get";

    let id = parse_id::<VmnicId>(vmnic_id).step(STEP)?;
    ctx.topology().get_vmnic(id).step(STEP)
}

pub fn set<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
    vmnic_id: &str,
    num_queues: u16,
) -> Result<VmnicInfo, CmdError> {
    const STEP: &str = "vmnic set";

    let id = parse_id::<VmnicId>(vmnic_id).step(STEP)?;
    ctx.require_root(STEP)?;
    ctx.topology().set_vmnic_queues(id, num_queues).step(STEP)
}

pub fn list<T: ResourceTable, V: VolumeManager>(
    ctx: &Ctx<T, V>,
) -> Result<Vec<VmnicInfo>, CmdError> {
    ctx.topology().list::<VmnicInfo>(&ListFilter::All).step("vmnic list")
}
