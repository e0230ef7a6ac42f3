// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Command orchestrators.
//!
//! Each orchestrator maps one operator intent onto a fixed sequence
//! of engine calls. Input is parsed and checked before the first
//! driver call. A failure part way through a sequence stops it there:
//! whatever earlier steps created is left in place and reported
//! through the failing step's name.

use slog::Logger;
use thiserror::Error;
use vpc::ErrorKind;
use vpc::Topology;
use vpc::table::ResourceTable;
use vpc::volume::VolumeManager;

pub mod ethlink;
pub mod list;
pub mod port;
pub mod switch;
pub mod vmnic;

/// The effective privilege of this process.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Privilege {
    Root,
    Unprivileged { euid: u32 },
}

impl Privilege {
    pub fn current() -> Self {
        let euid = nix::unistd::geteuid();
        if euid.is_root() {
            Self::Root
        } else {
            Self::Unprivileged { euid: euid.as_raw() }
        }
    }
}

#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Engine(#[from] vpc::Error),

    #[error("must be run as root (effective uid {euid})")]
    NotPrivileged { euid: u32 },
}

/// A failed command step.
#[derive(Debug, Error)]
#[error("{step}: {source}")]
pub struct CmdError {
    pub step: &'static str,
    #[source]
    pub source: Failure,
}

impl CmdError {
    pub fn new(step: &'static str, source: impl Into<Failure>) -> Self {
        Self { step, source: source.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.source {
            Failure::Engine(e) => e.kind(),
            Failure::NotPrivileged { .. } => ErrorKind::PermissionDenied,
        }
    }

    pub fn exit_code(&self) -> u8 {
        exit_code(self.kind())
    }
}

/// The process exit status for a failure of `kind`, following
/// sysexits(3).
pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidInput => 64,
        ErrorKind::Conflict => 65,
        ErrorKind::NotFound => 66,
        ErrorKind::DriverUnavailable => 69,
        ErrorKind::InUse => 75,
        ErrorKind::PermissionDenied => 77,
    }
}

/// Attach a step name to an engine result.
pub trait Step<T> {
    fn step(self, step: &'static str) -> Result<T, CmdError>;
}

impl<T, E: Into<Failure>> Step<T> for Result<T, E> {
    fn step(self, step: &'static str) -> Result<T, CmdError> {
        self.map_err(|e| CmdError::new(step, e))
    }
}

/// Everything a command needs: the engine, the volume manager, and
/// the caller's privilege.
pub struct Ctx<T, V> {
    topo: Topology<T>,
    volumes: V,
    privilege: Privilege,
    log: Logger,
}

impl<T: ResourceTable, V: VolumeManager> Ctx<T, V> {
    pub fn new(
        table: T,
        volumes: V,
        privilege: Privilege,
        log: Logger,
    ) -> Self {
        let topo_log = log.new(slog::o!("unit" => "topology"));
        let topo = Topology::new(table, topo_log);
        Self { topo, volumes, privilege, log }
    }

    pub fn topology(&self) -> &Topology<T> {
        &self.topo
    }

    pub fn volumes(&self) -> &V {
        &self.volumes
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }

    /// Refuse a mutating command unless running as root.
    pub fn require_root(&self, step: &'static str) -> Result<(), CmdError> {
        match self.privilege {
            Privilege::Root => Ok(()),
            Privilege::Unprivileged { euid } => {
                Err(CmdError::new(step, Failure::NotPrivileged { euid }))
            }
        }
    }
}

/// Parse an optional operator-supplied identifier.
pub(crate) fn parse_opt_id<I: From<uuid::Uuid>>(
    raw: Option<&str>,
) -> Result<Option<I>, vpc::Error> {
    raw.map(|raw| vpc::api::parse_id::<I>(raw).map_err(vpc::Error::from))
        .transpose()
}

pub(crate) fn parse_id<I: From<uuid::Uuid>>(
    raw: &str,
) -> Result<I, vpc::Error> {
    Ok(vpc::api::parse_id::<I>(raw)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::InvalidInput,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::InUse,
            ErrorKind::DriverUnavailable,
            ErrorKind::PermissionDenied,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| exit_code(*k)).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0) && !codes.contains(&1));
    }

    #[test]
    fn error_names_its_step() {
        let e = CmdError::new(
            "switch destroy",
            vpc::Error::invalid("switch id", "empty"),
        );
        assert_eq!(e.to_string(), "switch destroy: invalid switch id: empty");
        assert_eq!(e.exit_code(), 64);

        let failure = Failure::NotPrivileged { euid: 1000 };
        let e = CmdError::new("vmnic create", failure);
        assert_eq!(e.kind(), ErrorKind::PermissionDenied);
        assert_eq!(e.exit_code(), 77);
    }
}
