// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Guest storage on ZFS, driven through zfs(8).

use slog::Logger;
use slog::debug;
use std::process::Command;
use std::process::Output;
use vpc::volume::Provisioned;
use vpc::volume::VolumeError;
use vpc::volume::VolumeManager;

pub struct ZfsVolumes {
    zfs: String,
    log: Logger,
}

impl ZfsVolumes {
    pub const ZFS: &'static str = "zfs";

    pub fn new(log: Logger) -> Self {
        Self::with_command(Self::ZFS, log)
    }

    /// Use `zfs` as the path to the zfs(8) binary.
    pub fn with_command(zfs: &str, log: Logger) -> Self {
        Self { zfs: zfs.to_string(), log }
    }

    fn run(&self, args: &[&str]) -> Result<Output, VolumeError> {
        debug!(self.log, "exec"; "cmd" => &self.zfs, "args" => args.join(" "));
        Command::new(&self.zfs).args(args).output().map_err(|e| {
            VolumeError::Unavailable(format!("failed to run {}: {e}", self.zfs))
        })
    }

    fn exists(&self, name: &str) -> Result<bool, VolumeError> {
        let out = self.run(&["list", "-H", "-o", "name", name])?;
        if out.status.success() {
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&out.stderr);
        if stderr.contains("does not exist") {
            return Ok(false);
        }

        Err(VolumeError::Query {
            name: name.to_string(),
            msg: stderr.trim().to_string(),
        })
    }

    fn create(
        &self,
        what: &'static str,
        name: &str,
        args: &[&str],
    ) -> Result<Provisioned, VolumeError> {
        if self.exists(name)? {
            return Ok(Provisioned::Existing);
        }

        let out = self.run(args)?;
        if !out.status.success() {
            return Err(VolumeError::Create {
                what,
                name: name.to_string(),
                msg: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        Ok(Provisioned::Created)
    }
}

impl VolumeManager for ZfsVolumes {
    fn ensure_filesystem(
        &self,
        name: &str,
    ) -> Result<Provisioned, VolumeError> {
        self.create("filesystem", name, &["create", name])
    }

    fn ensure_volume(
        &self,
        name: &str,
        size: &str,
    ) -> Result<Provisioned, VolumeError> {
        self.create("volume", name, &["create", "-V", size, name])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn discard() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let zfs = ZfsVolumes::with_command("/nonexistent/zfs", discard());
        let err = zfs.ensure_filesystem("zroot/vpc").unwrap_err();
        assert!(matches!(err, VolumeError::Unavailable(_)));
    }

    #[test]
    fn failed_query_is_reported() {
        // false(1) exits non-zero with nothing on stderr.
        let zfs = ZfsVolumes::with_command("false", discard());
        let err = zfs.ensure_volume("zroot/vpc/disk0", "1G").unwrap_err();
        assert!(matches!(err, VolumeError::Query { .. }));
    }

    #[test]
    fn existing_dataset_is_left_alone() {
        // true(1) answers every `zfs list` with success.
        let zfs = ZfsVolumes::with_command("true", discard());
        assert_eq!(
            zfs.ensure_filesystem("zroot/vpc").unwrap(),
            Provisioned::Existing
        );
    }
}
