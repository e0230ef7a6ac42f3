// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use slog::Logger;
use slog::debug;
use slog::error;
use slog::o;

use vpc::api::VpcError;
use vpc::print::print_ethlinks;
use vpc::print::print_ports;
use vpc::print::print_switches;
use vpc::print::print_topology;
use vpc::print::print_vmnics;
use vpc_ioctl::VpcHdl;
use vpcadm::cmd;
use vpcadm::cmd::CmdError;
use vpcadm::cmd::Ctx;
use vpcadm::cmd::Privilege;
use vpcadm::config::Config;
use vpcadm::logging;
use vpcadm::logging::LogFormat;
use vpcadm::logging::LogLevel;
use vpcadm::vpcadm_pkg_version;
use vpcadm::zfs::ZfsVolumes;

/// Configure and manage VPC switches, ports, vmnics, and ethlinks
#[derive(Debug, Parser)]
#[command(version = vpcadm_pkg_version())]
struct Cli {
    /// Read configuration from this file instead of searching for one.
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Change the log level sent to stderr.
    #[arg(long, short = 'l', global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Specify the log format.
    #[arg(long, short = 'F', global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Emit JSON rather than tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// VPC switch management.
    #[command(subcommand, visible_alias = "sw")]
    Switch(SwitchCmd),

    /// VM network interface management.
    #[command(subcommand)]
    Vmnic(VmnicCmd),

    /// Uplink attachment management.
    #[command(subcommand)]
    Ethlink(EthlinkCmd),

    /// List every switch, port, vmnic, and ethlink.
    List,
}

#[derive(Debug, Subcommand)]
enum SwitchCmd {
    /// Create a switch.
    Create {
        #[arg(long)]
        vni: u32,

        #[arg(long)]
        switch_id: Option<String>,

        /// Human name for the switch; defaults to `vpcsw<vni>`.
        #[arg(long)]
        name: Option<String>,
    },

    /// Destroy a switch with no ports.
    Destroy {
        #[arg(long)]
        switch_id: String,
    },

    /// List switches.
    List,

    /// Switch port management.
    #[command(subcommand)]
    Port(PortCmd),
}

#[derive(Debug, Subcommand)]
enum PortCmd {
    /// Add a port to a switch.
    Add {
        #[arg(long)]
        switch_id: String,

        #[arg(long)]
        port_id: Option<String>,

        /// Make this an uplink port.
        #[arg(long)]
        uplink: bool,

        /// Attach the uplink to this host link.
        #[arg(long, requires = "uplink")]
        l2_name: Option<String>,

        /// Identifier for the uplink's ethlink.
        #[arg(long, requires = "l2_name")]
        ethlink_id: Option<String>,
    },

    /// Remove an unconnected port from its switch.
    Remove {
        #[arg(long)]
        port_id: String,

        /// Refuse unless the port belongs to this switch.
        #[arg(long)]
        switch_id: Option<String>,
    },

    /// Connect a port to a vmnic or ethlink.
    Connect {
        #[arg(long)]
        port_id: String,

        #[arg(long)]
        interface_id: String,
    },

    /// Disconnect a port from its vmnic or ethlink.
    Disconnect {
        #[arg(long)]
        port_id: String,

        /// Refuse unless the port is connected to this interface.
        #[arg(long)]
        interface_id: Option<String>,
    },

    /// List ports.
    List {
        #[arg(long)]
        switch_id: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum VmnicCmd {
    /// Create a vmnic and provision its guest's storage.
    Create {
        #[arg(long)]
        vmnic_id: Option<String>,

        /// NIC emulation presented to the guest.
        #[arg(long)]
        driver: Option<String>,

        #[arg(long)]
        num_queues: Option<u16>,

        #[arg(long)]
        mac: Option<String>,

        /// Host device name; chosen by the driver when absent.
        #[arg(long)]
        devname: Option<String>,

        /// Name the guest's datasets after this id instead of the
        /// vmnic's.
        #[arg(long)]
        vm_id: Option<String>,

        /// Size of the guest's boot disk.
        #[arg(long)]
        disk_size: Option<String>,

        /// Do not provision any storage.
        #[arg(long, conflicts_with_all = ["vm_id", "disk_size"])]
        no_storage: bool,
    },

    /// Destroy an unconnected vmnic.
    Destroy {
        #[arg(long)]
        vmnic_id: String,
    },

    /// Show a vmnic.
    Get {
        #[arg(long)]
        vmnic_id: String,
    },

    /// Change a vmnic's parameters.
    Set {
        #[arg(long)]
        vmnic_id: String,

        #[arg(long)]
        num_queues: u16,
    },

    /// List vmnics.
    List,
}

#[derive(Debug, Subcommand)]
enum EthlinkCmd {
    /// Claim a host link as an uplink attachment point.
    Create {
        #[arg(long)]
        l2_name: String,

        #[arg(long)]
        ethlink_id: Option<String>,
    },

    /// Release an unconnected ethlink.
    Destroy {
        #[arg(long)]
        ethlink_id: String,
    },

    /// List ethlinks.
    List {
        #[arg(long)]
        l2_name: Option<String>,
    },
}

#[derive(Serialize)]
struct Destroyed {
    destroyed: &'static str,
    id: uuid::Uuid,
}

struct Output {
    json: bool,
}

impl Output {
    fn emit<S, F>(&self, value: &S, human: F) -> anyhow::Result<()>
    where
        S: Serialize,
        F: FnOnce(&S) -> io::Result<()>,
    {
        if self.json {
            serde_json::to_writer_pretty(io::stdout().lock(), value)?;
            println!();
        } else {
            human(value)?;
        }
        Ok(())
    }

    fn destroyed(
        &self,
        what: &'static str,
        id: impl Into<uuid::Uuid>,
    ) -> anyhow::Result<()> {
        let value = Destroyed { destroyed: what, id: id.into() };
        self.emit(&value, |d| {
            println!("destroyed {} {}", d.destroyed, d.id);
            Ok(())
        })
    }
}

fn open_ctx(
    cfg: &Config,
    log: &Logger,
) -> Result<Ctx<VpcHdl, ZfsVolumes>, CmdError> {
    let hdl = VpcHdl::open_on(&cfg.control_device).map_err(|e| {
        CmdError::new(
            "open control device",
            vpc::Error::Driver { op: "open", source: VpcError::from(e) },
        )
    })?;
    let volumes = ZfsVolumes::new(log.new(o!("unit" => "zfs")));
    Ok(Ctx::new(hdl, volumes, Privilege::current(), log.clone()))
}

fn run(cli: Cli, cfg: &Config, log: &Logger) -> anyhow::Result<()> {
    let out = Output { json: cli.json };
    let ctx = open_ctx(cfg, log)?;

    match cli.command {
        Command::Switch(SwitchCmd::Create { vni, switch_id, name }) => {
            let args = cmd::switch::CreateArgs { vni, switch_id, name };
            let sw = cmd::switch::create(&ctx, &args)?;
            out.emit(&sw, |sw| print_switches(std::slice::from_ref(sw)))?;
        }

        Command::Switch(SwitchCmd::Destroy { switch_id }) => {
            let id = cmd::switch::destroy(&ctx, &switch_id)?;
            out.destroyed("switch", id)?;
        }

        Command::Switch(SwitchCmd::List) => {
            let switches = cmd::switch::list(&ctx)?;
            out.emit(&switches, |s| print_switches(s))?;
        }

        Command::Switch(SwitchCmd::Port(PortCmd::Add {
            switch_id,
            port_id,
            uplink,
            l2_name,
            ethlink_id,
        })) => {
            let args = cmd::port::AddArgs {
                switch_id,
                port_id,
                uplink,
                l2_name,
                ethlink_id,
            };
            let added = cmd::port::add(&ctx, &args)?;
            out.emit(&added, |a| {
                print_ports(std::slice::from_ref(&a.port))?;
                if let Some(link) = &a.ethlink {
                    println!();
                    print_ethlinks(std::slice::from_ref(link))?;
                }
                Ok(())
            })?;
        }

        Command::Switch(SwitchCmd::Port(PortCmd::Remove {
            port_id,
            switch_id,
        })) => {
            let id = cmd::port::remove(&ctx, &port_id, switch_id.as_deref())?;
            out.destroyed("port", id)?;
        }

        Command::Switch(SwitchCmd::Port(PortCmd::Connect {
            port_id,
            interface_id,
        })) => {
            let port = cmd::port::connect(&ctx, &port_id, &interface_id)?;
            out.emit(&port, |p| print_ports(std::slice::from_ref(p)))?;
        }

        Command::Switch(SwitchCmd::Port(PortCmd::Disconnect {
            port_id,
            interface_id,
        })) => {
            let port =
                cmd::port::disconnect(&ctx, &port_id, interface_id.as_deref())?;
            out.emit(&port, |p| print_ports(std::slice::from_ref(p)))?;
        }

        Command::Switch(SwitchCmd::Port(PortCmd::List { switch_id })) => {
            let ports = cmd::port::list(&ctx, switch_id.as_deref())?;
            out.emit(&ports, |p| print_ports(p))?;
        }

        Command::Vmnic(VmnicCmd::Create {
            vmnic_id,
            driver,
            num_queues,
            mac,
            devname,
            vm_id,
            disk_size,
            no_storage,
        }) => {
            let storage = (!no_storage).then(|| cmd::vmnic::StorageArgs {
                dataset_root: cfg.storage.dataset_root.clone(),
                disk_size: disk_size
                    .unwrap_or_else(|| cfg.storage.disk_size.clone()),
                vm_id,
            });
            let args = cmd::vmnic::CreateArgs {
                vmnic_id,
                driver: driver.unwrap_or_else(|| cfg.vmnic.driver.clone()),
                num_queues: num_queues.unwrap_or(cfg.vmnic.queues),
                mac,
                devname,
                storage,
            };
            let created = cmd::vmnic::create(&ctx, &args)?;
            out.emit(&created, |c| {
                print_vmnics(std::slice::from_ref(&c.vmnic))?;
                if let Some(ds) = &c.storage {
                    println!("\nstorage: {}", ds.root);
                }
                Ok(())
            })?;
        }

        Command::Vmnic(VmnicCmd::Destroy { vmnic_id }) => {
            let id = cmd::vmnic::destroy(&ctx, &vmnic_id)?;
            out.destroyed("vmnic", id)?;
        }

        Command::Vmnic(VmnicCmd::Get { vmnic_id }) => {
            let nic = cmd::vmnic::get(&ctx, &vmnic_id)?;
            out.emit(&nic, |n| print_vmnics(std::slice::from_ref(n)))?;
        }

        Command::Vmnic(VmnicCmd::Set { vmnic_id, num_queues }) => {
            let nic = cmd::vmnic::set(&ctx, &vmnic_id, num_queues)?;
            out.emit(&nic, |n| print_vmnics(std::slice::from_ref(n)))?;
        }

        Command::Vmnic(VmnicCmd::List) => {
            let nics = cmd::vmnic::list(&ctx)?;
            out.emit(&nics, |n| print_vmnics(n))?;
        }

        Command::Ethlink(EthlinkCmd::Create { l2_name, ethlink_id }) => {
            let link =
                cmd::ethlink::create(&ctx, &l2_name, ethlink_id.as_deref())?;
            out.emit(&link, |l| print_ethlinks(std::slice::from_ref(l)))?;
        }

        Command::Ethlink(EthlinkCmd::Destroy { ethlink_id }) => {
            let id = cmd::ethlink::destroy(&ctx, &ethlink_id)?;
            out.destroyed("ethlink", id)?;
        }

        Command::Ethlink(EthlinkCmd::List { l2_name }) => {
            let links = cmd::ethlink::list(&ctx, l2_name.as_deref())?;
            out.emit(&links, |l| print_ethlinks(l))?;
        }

        Command::List => {
            let snap = cmd::list::topology(&ctx)?;
            out.emit(&snap, print_topology)?;
        }
    }

    Ok(())
}

/// Report a failure on stderr and pick the exit status.
fn report(log: &Logger, err: anyhow::Error) -> ExitCode {
    match err.downcast_ref::<CmdError>() {
        Some(e) => {
            error!(
                log,
                "command failed";
                "step" => e.step,
                "kind" => %e.kind(),
            );
            eprintln!("error: {e} ({})", e.kind());
            ExitCode::from(e.exit_code())
        }
        None => {
            error!(log, "command failed"; "error" => %err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (cfg, cfg_path) = match Config::load(cli.config.as_deref())
        .context("loading configuration")
    {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.unwrap_or(cfg.log.level);
    let format = cli.log_format.unwrap_or(cfg.log.format);
    let (log, guard) = logging::init(level, format);
    debug!(log, "configuration loaded"; "path" => ?cfg_path);

    let code = match run(cli, &cfg, &log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&log, e),
    };

    // Flush the async drain before exiting.
    drop(log);
    drop(guard);
    code
}
