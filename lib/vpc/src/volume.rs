// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Guest storage provisioning.
//!
//! Storage lives outside the topology; the engine only needs a way to
//! ask for a dataset to exist. Both operations are create-if-absent
//! and are never retried here.

use serde::Serialize;
use slog::Logger;
use slog::info;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("unable to query dataset {name}: {msg}")]
    Query { name: String, msg: String },

    #[error("unable to create {what} {name}: {msg}")]
    Create { what: &'static str, name: String, msg: String },

    #[error("volume manager unavailable: {0}")]
    Unavailable(String),
}

/// What an `ensure_*` call found.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Provisioned {
    Created,
    Existing,
}

pub trait VolumeManager {
    /// Ensure a filesystem dataset named `name` exists.
    fn ensure_filesystem(&self, name: &str)
    -> Result<Provisioned, VolumeError>;

    /// Ensure a block volume named `name` of `size` exists. The size
    /// of an existing volume is left alone.
    fn ensure_volume(
        &self,
        name: &str,
        size: &str,
    ) -> Result<Provisioned, VolumeError>;
}

impl<V: VolumeManager + ?Sized> VolumeManager for &V {
    fn ensure_filesystem(
        &self,
        name: &str,
    ) -> Result<Provisioned, VolumeError> {
        (**self).ensure_filesystem(name)
    }

    fn ensure_volume(
        &self,
        name: &str,
        size: &str,
    ) -> Result<Provisioned, VolumeError> {
        (**self).ensure_volume(name, size)
    }
}

/// Validate a human size such as `256M` or `10G`.
pub fn validate_size(size: &str) -> Result<(), String> {
    let digits =
        size.trim_end_matches(['K', 'M', 'G', 'T', 'k', 'm', 'g', 't']);
    if digits.is_empty() || size.len() - digits.len() > 1 {
        return Err(format!("bad size: {size:?}"));
    }

    match digits.parse::<u64>() {
        Ok(0) => Err(format!("size must be non-zero: {size:?}")),
        Ok(_) => Ok(()),
        Err(_) => Err(format!("bad size: {size:?}")),
    }
}

/// The datasets backing one guest.
///
/// ```text
/// <root>/<vm-id>
/// <root>/<vm-id>/firmware
/// <root>/<vm-id>/iso
/// <root>/<vm-id>/disk0      (volume)
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct GuestDatasets {
    pub root: String,
    pub firmware: String,
    pub iso: String,
    pub disk0: String,
}

impl GuestDatasets {
    pub fn new(dataset_root: &str, vm_id: Uuid) -> Self {
        let root = format!(
            "{}/{}",
            dataset_root.trim_end_matches('/'),
            vm_id.hyphenated()
        );
        Self {
            firmware: format!("{root}/firmware"),
            iso: format!("{root}/iso"),
            disk0: format!("{root}/disk0"),
            root,
        }
    }

    /// Create whatever part of the layout is missing, parents first.
    /// Stops at the first failure; datasets created before it are
    /// left in place.
    pub fn provision(
        &self,
        vm: &impl VolumeManager,
        disk_size: &str,
        log: &Logger,
    ) -> Result<(), VolumeError> {
        for fs in [&self.root, &self.firmware, &self.iso] {
            if vm.ensure_filesystem(fs)? == Provisioned::Created {
                info!(log, "created filesystem"; "filesystem" => fs);
            }
        }

        if vm.ensure_volume(&self.disk0, disk_size)? == Provisioned::Created {
            info!(
                log,
                "created volume";
                "volume" => &self.disk0,
                "disksize" => disk_size,
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sizes() {
        assert!(validate_size("256M").is_ok());
        assert!(validate_size("10G").is_ok());
        assert!(validate_size("4096").is_ok());
        assert!(validate_size("").is_err());
        assert!(validate_size("M").is_err());
        assert!(validate_size("0G").is_err());
        assert!(validate_size("10GG").is_err());
        assert!(validate_size("1.5G").is_err());
    }

    #[test]
    fn layout() {
        let id: Uuid = "07f95a11-6788-2ae7-c3ce-ba95cff1db38".parse().unwrap();
        let ds = GuestDatasets::new("zroot/vpc/guests/", id);
        assert_eq!(
            ds.root,
            "zroot/vpc/guests/07f95a11-6788-2ae7-c3ce-ba95cff1db38"
        );
        assert_eq!(ds.disk0, format!("{}/disk0", ds.root));
        assert_eq!(ds.firmware, format!("{}/firmware", ds.root));
    }
}
