// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Command orchestration against the in-memory driver and volume
//! manager.

use uuid::Uuid;
use vpc_test_utils::*;
use vpcadm::cmd;
use vpcadm::cmd::Ctx;
use vpcadm::cmd::Privilege;
use vpcadm::cmd::port::AddArgs;
use vpcadm::cmd::switch::CreateArgs as SwitchArgs;
use vpcadm::cmd::vmnic::CreateArgs as VmnicArgs;
use vpcadm::cmd::vmnic::StorageArgs;

const ROOT: &str = "zroot/vpc/guests";

fn ctx() -> Ctx<MemTable, MemVolumes> {
    Ctx::new(MemTable::new(), MemVolumes::new(), Privilege::Root, test_logger())
}

fn vmnic_args(storage: bool) -> VmnicArgs {
    VmnicArgs {
        vmnic_id: None,
        driver: "virtio-net".to_string(),
        num_queues: 1,
        mac: None,
        devname: None,
        storage: storage.then(|| StorageArgs {
            dataset_root: ROOT.to_string(),
            disk_size: "256M".to_string(),
            vm_id: None,
        }),
    }
}

fn fresh_id() -> Uuid {
    vpc::api::new_id::<Uuid>().unwrap()
}

fn switch(ctx: &Ctx<MemTable, MemVolumes>, vni: u32) -> SwitchId {
    let args = SwitchArgs { vni, ..Default::default() };
    cmd::switch::create(ctx, &args).unwrap().id
}

#[test]
fn switch_name_defaults_to_vni() {
    let ctx = ctx();
    let args = SwitchArgs { vni: 12, ..Default::default() };
    let sw = cmd::switch::create(&ctx, &args).unwrap();
    assert_eq!(sw.name, "vpcsw12");
}

#[test]
fn vmnic_storage_is_provisioned_before_registration() {
    let ctx = ctx();
    let id = fresh_id();
    let mut args = vmnic_args(true);
    args.vmnic_id = Some(id.to_string());

    let created = cmd::vmnic::create(&ctx, &args).unwrap();
    assert_eq!(Uuid::from(created.vmnic.id), id);

    // Named after the vmnic when no vm id is given.
    let root = format!("{ROOT}/{id}");
    let ds = created.storage.unwrap();
    assert_eq!(ds.root, root);
    assert_eq!(
        ctx.volumes().calls(),
        vec![
            VolumeCall::Filesystem(root.clone()),
            VolumeCall::Filesystem(format!("{root}/firmware")),
            VolumeCall::Filesystem(format!("{root}/iso")),
            VolumeCall::Volume {
                name: format!("{root}/disk0"),
                size: "256M".to_string(),
            },
        ]
    );
    assert_eq!(ctx.topology().table().count(ResourceKind::Vmnic), 1);
}

#[test]
fn vmnic_storage_can_follow_the_vm() {
    let ctx = ctx();
    let vm = fresh_id();
    let mut args = vmnic_args(true);
    if let Some(s) = args.storage.as_mut() {
        s.vm_id = Some(vm.to_string());
    }

    let created = cmd::vmnic::create(&ctx, &args).unwrap();
    assert_eq!(created.storage.unwrap().root, format!("{ROOT}/{vm}"));
    assert_ne!(Uuid::from(created.vmnic.id), vm);
}

#[test]
fn storage_failure_stops_before_the_driver() {
    let ctx = ctx();
    let id = fresh_id();
    ctx.volumes().fail_on(&format!("{ROOT}/{id}/disk0"));

    let mut args = vmnic_args(true);
    args.vmnic_id = Some(id.to_string());
    let err = cmd::vmnic::create(&ctx, &args).unwrap_err();

    assert_eq!(err.step, "vmnic create: provision storage");
    assert!(err.to_string().contains("out of space"), "{err}");
    assert!(!ctx.topology().table().calls().contains(&VpcCmd::Create));
    assert_eq!(ctx.topology().table().count(ResourceKind::Vmnic), 0);

    // The filesystems made before the failure stay.
    assert!(ctx.volumes().exists(&format!("{ROOT}/{id}/iso")));
}

#[test]
fn registration_failure_leaves_storage() {
    let ctx = ctx();
    let id = fresh_id();
    ctx.topology()
        .table()
        .fail_next(VpcCmd::Create, VpcError::Invalid("no queues left".into()));

    let mut args = vmnic_args(true);
    args.vmnic_id = Some(id.to_string());
    let err = cmd::vmnic::create(&ctx, &args).unwrap_err();

    assert_eq!(err.step, "vmnic create: register vmnic");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(ctx.volumes().exists(&format!("{ROOT}/{id}/disk0")));
    assert_eq!(ctx.topology().table().count(ResourceKind::Vmnic), 0);
}

#[test]
fn vmnic_without_storage() {
    let ctx = ctx();
    let created = cmd::vmnic::create(&ctx, &vmnic_args(false)).unwrap();
    assert!(created.storage.is_none());
    assert!(ctx.volumes().calls().is_empty());
}

#[test]
fn bad_disk_size_is_caught_up_front() {
    let ctx = ctx();
    let mut args = vmnic_args(true);
    if let Some(s) = args.storage.as_mut() {
        s.disk_size = "lots".to_string();
    }

    let err = cmd::vmnic::create(&ctx, &args).unwrap_err();
    assert_eq!(err.exit_code(), 64);
    assert!(ctx.volumes().calls().is_empty());
    assert!(ctx.topology().table().calls().is_empty());
}

#[test]
fn uplink_port_add_attaches_an_ethlink() {
    let ctx = ctx();
    let sw = switch(&ctx, 100);
    let args = AddArgs {
        switch_id: sw.to_string(),
        uplink: true,
        l2_name: Some("em0".to_string()),
        ..Default::default()
    };

    let added = cmd::port::add(&ctx, &args).unwrap();
    let link = added.ethlink.unwrap();
    assert_eq!(link.link_name, "em0");
    assert_eq!(link.port, Some(added.port.id));
    assert_eq!(link.state, EndpointState::Connected);
    assert_eq!(added.port.endpoint, Some(Endpoint::Ethlink(link.id)));
    assert!(added.port.uplink);

    // A second uplink on the same link reuses the live ethlink, which
    // is already taken.
    let err = cmd::port::add(&ctx, &args).unwrap_err();
    assert_eq!(err.step, "port add: connect uplink");
    assert_eq!(ctx.topology().table().count(ResourceKind::Ethlink), 1);

    // The second port was added and is left in place.
    assert_eq!(ctx.topology().table().count(ResourceKind::Port), 2);
}

#[test]
fn uplink_port_add_reports_an_applied_connect() {
    let ctx = ctx();
    let sw = switch(&ctx, 150);
    ctx.topology().table().fail_after(VpcCmd::Bind, "transport timeout");

    let args = AddArgs {
        switch_id: sw.to_string(),
        uplink: true,
        l2_name: Some("em2".to_string()),
        ..Default::default()
    };
    let added = cmd::port::add(&ctx, &args).unwrap();
    let link = added.ethlink.unwrap();
    assert_eq!(link.port, Some(added.port.id));
    assert_eq!(link.state, EndpointState::Connected);
    assert_eq!(added.port.endpoint, Some(Endpoint::Ethlink(link.id)));

    ctx.topology().table().set_unavailable(None);
    let listed = cmd::ethlink::list(&ctx, Some("em2")).unwrap();
    assert_eq!(listed, vec![link]);
}

#[test]
fn uplink_port_add_reuses_a_free_ethlink() {
    let ctx = ctx();
    let sw = switch(&ctx, 100);
    let link = cmd::ethlink::create(&ctx, "em1", None).unwrap();

    let args = AddArgs {
        switch_id: sw.to_string(),
        uplink: true,
        l2_name: Some("em1".to_string()),
        ..Default::default()
    };
    let added = cmd::port::add(&ctx, &args).unwrap();
    assert_eq!(added.ethlink.unwrap().id, link.id);
    assert_eq!(ctx.topology().table().count(ResourceKind::Ethlink), 1);
}

#[test]
fn uplink_ethlink_id_must_match_the_link() {
    let ctx = ctx();
    let sw = switch(&ctx, 100);
    let link = cmd::ethlink::create(&ctx, "em0", None).unwrap();

    let args = AddArgs {
        switch_id: sw.to_string(),
        uplink: true,
        l2_name: Some("em1".to_string()),
        ethlink_id: Some(link.id.to_string()),
        ..Default::default()
    };
    let err = cmd::port::add(&ctx, &args).unwrap_err();
    assert_eq!(err.step, "port add: create ethlink");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    // An unused id names the ethlink to create.
    let fresh = fresh_id();
    let args = AddArgs { ethlink_id: Some(fresh.to_string()), ..args };
    let added = cmd::port::add(&ctx, &args).unwrap();
    assert_eq!(Uuid::from(added.ethlink.unwrap().id), fresh);
}

#[test]
fn l2_name_needs_an_uplink() {
    let ctx = ctx();
    let sw = switch(&ctx, 100);
    let calls = ctx.topology().table().calls().len();

    let args = AddArgs {
        switch_id: sw.to_string(),
        l2_name: Some("em0".to_string()),
        ..Default::default()
    };
    let err = cmd::port::add(&ctx, &args).unwrap_err();
    assert_eq!(err.exit_code(), 64);
    assert_eq!(ctx.topology().table().calls().len(), calls);
}

#[test]
fn unprivileged_callers_are_refused() {
    let ctx = Ctx::new(
        MemTable::new(),
        MemVolumes::new(),
        Privilege::Unprivileged { euid: 1000 },
        test_logger(),
    );

    let err =
        cmd::switch::create(&ctx, &SwitchArgs { vni: 5, ..Default::default() })
            .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.exit_code(), 77);
    assert!(err.to_string().contains("1000"), "{err}");

    let err = cmd::vmnic::create(&ctx, &vmnic_args(true)).unwrap_err();
    assert_eq!(err.exit_code(), 77);

    assert!(ctx.topology().table().calls().is_empty());
    assert!(ctx.volumes().calls().is_empty());

    // Reading needs no privilege.
    assert!(cmd::switch::list(&ctx).unwrap().is_empty());
}

#[test]
fn malformed_ids_are_invalid_input() {
    let ctx = ctx();
    let err = cmd::switch::destroy(&ctx, "not-a-uuid").unwrap_err();
    assert_eq!(err.step, "switch destroy");
    assert_eq!(err.exit_code(), 64);

    let err = cmd::port::connect(&ctx, &fresh_id().to_string(), "bogus")
        .unwrap_err();
    assert_eq!(err.exit_code(), 64);
    assert!(ctx.topology().table().calls().is_empty());
}

#[test]
fn connect_and_disconnect_by_interface_id() {
    let ctx = ctx();
    let sw = switch(&ctx, 200);
    let port = cmd::port::add(
        &ctx,
        &AddArgs { switch_id: sw.to_string(), ..Default::default() },
    )
    .unwrap()
    .port;
    let nic = cmd::vmnic::create(&ctx, &vmnic_args(false)).unwrap().vmnic;
    let (port_id, nic_id) = (port.id.to_string(), nic.id.to_string());

    let port = cmd::port::connect(&ctx, &port_id, &nic_id).unwrap();
    assert_eq!(port.endpoint, Some(Endpoint::Vmnic(nic.id)));

    // The vmnic cannot go while connected.
    let err = cmd::vmnic::destroy(&ctx, &nic_id).unwrap_err();
    assert_eq!(err.exit_code(), 75);

    // Disconnecting from the wrong interface is refused.
    let other = fresh_id().to_string();
    let err = cmd::port::disconnect(&ctx, &port_id, Some(&other)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let port = cmd::port::disconnect(&ctx, &port_id, Some(&nic_id)).unwrap();
    assert_eq!(port.endpoint, None);
    assert_eq!(cmd::vmnic::get(&ctx, &nic_id).unwrap().port, None);

    cmd::vmnic::destroy(&ctx, &nic_id).unwrap();
    cmd::port::remove(&ctx, &port_id, Some(&sw.to_string())).unwrap();
    cmd::switch::destroy(&ctx, &sw.to_string()).unwrap();
    assert!(cmd::list::topology(&ctx).unwrap().is_empty());
}

#[test]
fn port_remove_checks_the_switch() {
    let ctx = ctx();
    let a = switch(&ctx, 1);
    let b = switch(&ctx, 2);
    let port = cmd::port::add(
        &ctx,
        &AddArgs { switch_id: a.to_string(), ..Default::default() },
    )
    .unwrap()
    .port;

    let err =
        cmd::port::remove(&ctx, &port.id.to_string(), Some(&b.to_string()))
            .unwrap_err();
    assert_eq!(err.exit_code(), 64);
    assert_eq!(cmd::port::list(&ctx, Some(&a.to_string())).unwrap().len(), 1);
    assert!(cmd::port::list(&ctx, Some(&b.to_string())).unwrap().is_empty());
}

#[test]
fn set_queues_and_list() {
    let ctx = ctx();
    let nic = cmd::vmnic::create(&ctx, &vmnic_args(false)).unwrap().vmnic;
    let nic = cmd::vmnic::set(&ctx, &nic.id.to_string(), 8).unwrap();
    assert_eq!(nic.queues, 8);

    let err = cmd::vmnic::set(&ctx, &nic.id.to_string(), 0).unwrap_err();
    assert_eq!(err.exit_code(), 64);
    assert_eq!(cmd::vmnic::list(&ctx).unwrap(), vec![nic]);
}

#[test]
fn list_shows_everything() {
    let ctx = ctx();
    let sw = switch(&ctx, 300);
    let args = AddArgs {
        switch_id: sw.to_string(),
        uplink: true,
        l2_name: Some("em0".to_string()),
        ..Default::default()
    };
    cmd::port::add(&ctx, &args).unwrap();
    cmd::vmnic::create(&ctx, &vmnic_args(false)).unwrap();
    let calls = ctx.topology().table().calls().len();

    let snap = cmd::list::topology(&ctx).unwrap();
    assert_eq!(snap.switches.len(), 1);
    assert_eq!(snap.ports.len(), 1);
    assert_eq!(snap.vmnics.len(), 1);
    assert_eq!(snap.ethlinks.len(), 1);

    // Only List calls were made.
    let after = ctx.topology().table().calls();
    assert!(after[calls..].iter().all(|c| *c == VpcCmd::List));

    let links = cmd::ethlink::list(&ctx, Some("em0")).unwrap();
    assert_eq!(links.len(), 1);
    assert!(cmd::ethlink::list(&ctx, Some("em9")).unwrap().is_empty());
}

#[test]
fn driver_outage_maps_to_unavailable() {
    let ctx = ctx();
    ctx.topology().table().set_unavailable(Some("device detached"));
    let err = cmd::switch::list(&ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DriverUnavailable);
    assert_eq!(err.exit_code(), 69);
}
