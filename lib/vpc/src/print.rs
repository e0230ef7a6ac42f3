// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print topology resources in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both vpcadm and tests.

use crate::api::EthlinkInfo;
use crate::api::PortInfo;
use crate::api::ResourceState;
use crate::api::SwitchInfo;
use crate::api::VmnicInfo;
use crate::inspect::TopologySnapshot;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a list of [`SwitchInfo`].
pub fn print_switches(switches: &[SwitchInfo]) -> std::io::Result<()> {
    print_switches_into(&mut std::io::stdout(), switches)
}

/// Print a list of [`SwitchInfo`] into a given writer.
pub fn print_switches_into(
    writer: &mut impl Write,
    switches: &[SwitchInfo],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "SWITCH ID\tNAME\tVNI\tIFINDEX")?;
    for sw in switches {
        writeln!(t, "{}\t{}\t{}\t{}", sw.id, sw.name, sw.vni, sw.ifindex)?;
    }
    t.flush()
}

/// Print a list of [`PortInfo`].
pub fn print_ports(ports: &[PortInfo]) -> std::io::Result<()> {
    print_ports_into(&mut std::io::stdout(), ports)
}

/// Print a list of [`PortInfo`] into a given writer.
pub fn print_ports_into(
    writer: &mut impl Write,
    ports: &[PortInfo],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "PORT ID\tSWITCH ID\tUPLINK\tENDPOINT")?;
    for p in ports {
        let ep = match p.endpoint {
            Some(ep) => ep.to_string(),
            None => "-".to_string(),
        };
        writeln!(t, "{}\t{}\t{}\t{}", p.id, p.switch_id, p.uplink, ep)?;
    }
    t.flush()
}

/// Print a list of [`VmnicInfo`].
pub fn print_vmnics(vmnics: &[VmnicInfo]) -> std::io::Result<()> {
    print_vmnics_into(&mut std::io::stdout(), vmnics)
}

/// Print a list of [`VmnicInfo`] into a given writer.
pub fn print_vmnics_into(
    writer: &mut impl Write,
    vmnics: &[VmnicInfo],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "VMNIC ID\tDEVICE\tDRIVER\tMAC\tQUEUES\tSTATE\tPORT")?;
    for nic in vmnics {
        writeln!(
            t,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            nic.id,
            nic.devname,
            nic.driver,
            nic.mac,
            nic.queues,
            nic.state,
            opt_port(nic.port.map(|p| p.to_string())),
        )?;
    }
    t.flush()
}

/// Print a list of [`EthlinkInfo`].
pub fn print_ethlinks(ethlinks: &[EthlinkInfo]) -> std::io::Result<()> {
    print_ethlinks_into(&mut std::io::stdout(), ethlinks)
}

/// Print a list of [`EthlinkInfo`] into a given writer.
pub fn print_ethlinks_into(
    writer: &mut impl Write,
    ethlinks: &[EthlinkInfo],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "ETHLINK ID\tL2 NAME\tLIVE\tSTATE\tPORT")?;
    for link in ethlinks {
        writeln!(
            t,
            "{}\t{}\t{}\t{}\t{}",
            link.id,
            link.link_name,
            link.live,
            link.state,
            opt_port(link.port.map(|p| p.to_string())),
        )?;
    }
    t.flush()
}

/// Print a [`TopologySnapshot`].
pub fn print_topology(snap: &TopologySnapshot) -> std::io::Result<()> {
    print_topology_into(&mut std::io::stdout(), snap)
}

/// Print a [`TopologySnapshot`] into a given writer.
///
/// Kinds with no resources are left out entirely.
pub fn print_topology_into(
    writer: &mut impl Write,
    snap: &TopologySnapshot,
) -> std::io::Result<()> {
    let mut first = true;
    let mut section = |w: &mut dyn Write, title: &str| -> std::io::Result<()> {
        if !first {
            writeln!(w)?;
        }
        first = false;
        writeln!(w, "{title}")?;
        write_hr(w)
    };

    if !snap.switches.is_empty() {
        section(writer, "Switches")?;
        print_switches_into(writer, &snap.switches)?;
    }

    if !snap.ports.is_empty() {
        section(writer, "Ports")?;
        print_ports_into(writer, &snap.ports)?;
    }

    if !snap.vmnics.is_empty() {
        section(writer, "Vmnics")?;
        print_vmnics_into(writer, &snap.vmnics)?;
    }

    if !snap.ethlinks.is_empty() {
        section(writer, "Ethlinks")?;
        print_ethlinks_into(writer, &snap.ethlinks)?;
    }

    Ok(())
}

/// Print a single [`ResourceState`] as a one-row table of its kind.
pub fn print_state(state: &ResourceState) -> std::io::Result<()> {
    print_state_into(&mut std::io::stdout(), state)
}

/// Print a single [`ResourceState`] into a given writer.
pub fn print_state_into(
    writer: &mut impl Write,
    state: &ResourceState,
) -> std::io::Result<()> {
    match state {
        ResourceState::Switch(sw) => {
            print_switches_into(writer, core::slice::from_ref(sw))
        }
        ResourceState::Port(p) => {
            print_ports_into(writer, core::slice::from_ref(p))
        }
        ResourceState::Vmnic(nic) => {
            print_vmnics_into(writer, core::slice::from_ref(nic))
        }
        ResourceState::Ethlink(link) => {
            print_ethlinks_into(writer, core::slice::from_ref(link))
        }
    }
}

fn opt_port(port: Option<String>) -> String {
    port.unwrap_or_else(|| "-".to_string())
}

fn write_hr(w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{:-<70}", "")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Endpoint;
    use crate::api::EndpointState;
    use crate::api::MacAddr;
    use crate::api::PortId;
    use crate::api::SwitchId;
    use crate::api::VmnicId;
    use crate::api::Vni;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> std::io::Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn switch_table_aligns_columns() {
        let sw = SwitchInfo {
            id: SwitchId::new().unwrap(),
            name: "a-long-switch-name".into(),
            vni: Vni::new(100u32).unwrap(),
            ifindex: 7,
        };
        let out = render(|w| print_switches_into(w, &[sw.clone()]));
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("SWITCH ID"));
        assert_eq!(lines[0].find("NAME"), lines[1].find("a-long-switch-name"));
        assert!(lines[1].contains(&sw.id.to_string()));
        assert!(lines[1].contains("100"));
    }

    #[test]
    fn unbound_port_shows_dash() {
        let port = PortInfo {
            id: PortId::new().unwrap(),
            switch_id: SwitchId::new().unwrap(),
            uplink: false,
            endpoint: None,
        };
        let out = render(|w| print_ports_into(w, &[port]));
        assert!(out.lines().nth(1).unwrap().trim_end().ends_with('-'));
    }

    #[test]
    fn topology_skips_empty_kinds() {
        let nic = VmnicInfo {
            id: VmnicId::new().unwrap(),
            driver: "virtio-net".into(),
            queues: 2,
            mac: MacAddr::from_const([0x02, 0, 0, 0, 0, 1]),
            devname: "vmnic0".into(),
            ifindex: 3,
            port: None,
            state: EndpointState::Created,
        };
        let snap = TopologySnapshot { vmnics: vec![nic], ..Default::default() };
        let out = render(|w| print_topology_into(w, &snap));

        assert!(out.starts_with("Vmnics\n"));
        assert!(!out.contains("Switches"));
        assert!(out.contains("02:00:00:00:00:01"));
        assert!(out.contains("vmnic0"));
    }

    #[test]
    fn state_prints_its_kind() {
        let p = PortId::new().unwrap();
        let nic = VmnicId::new().unwrap();
        let state = ResourceState::Port(PortInfo {
            id: p,
            switch_id: SwitchId::new().unwrap(),
            uplink: false,
            endpoint: Some(Endpoint::Vmnic(nic)),
        });
        let out = render(|w| print_state_into(w, &state));
        assert!(out.starts_with("PORT ID"));
        assert!(out.contains(&format!("vmnic:{nic}")));
    }
}
