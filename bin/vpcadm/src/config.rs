// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! vpcadm configuration.
//!
//! The file is optional. An explicit `--config` path must exist;
//! otherwise the first of `$HOME/.config/vpc/vpc.toml` and
//! `./vpc.toml` that exists is used, falling back to built-in
//! defaults.

use crate::logging::LogFormat;
use crate::logging::LogLevel;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use vpc::topology::MAX_VMNIC_QUEUES;
use vpc::volume::validate_size;
use vpc_ioctl::VpcHdl;

pub const CONFIG_FILE: &str = "vpc.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {key} in {}: {msg}", path.display())]
    Invalid { path: PathBuf, key: &'static str, msg: String },
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The switch driver's control node.
    pub control_device: String,
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub vmnic: VmnicConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_device: VpcHdl::CTL.to_string(),
            log: LogConfig::default(),
            storage: StorageConfig::default(),
            vmnic: VmnicConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Parent dataset of every guest's datasets.
    pub dataset_root: String,
    /// Size of a new guest's boot disk.
    pub disk_size: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dataset_root: "zroot/vpc/guests".to_string(),
            disk_size: "256M".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmnicConfig {
    pub driver: String,
    pub queues: u16,
}

impl Default for VmnicConfig {
    fn default() -> Self {
        Self { driver: "virtio-net".to_string(), queues: 1 }
    }
}

impl Config {
    /// The implicit search path, in order.
    pub fn search_paths(home: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(2);
        if let Some(home) = home {
            paths.push(home.join(".config").join("vpc").join(CONFIG_FILE));
        }
        paths.push(PathBuf::from(".").join(CONFIG_FILE));
        paths
    }

    /// Load the configuration, returning it with the path it came
    /// from, if any.
    pub fn load(
        explicit: Option<&Path>,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Self::load_from(explicit, &Self::search_paths(home.as_deref()))
    }

    pub fn load_from(
        explicit: Option<&Path>,
        candidates: &[PathBuf],
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        for path in candidates {
            if path.is_file() {
                return Ok((Self::from_file(path)?, Some(path.clone())));
            }
        }

        Ok((Self::default(), None))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Read { path: path.to_path_buf(), source }
        })?;
        let cfg: Self = toml::from_str(&text).map_err(|source| {
            ConfigError::Parse { path: path.to_path_buf(), source }
        })?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |key, msg: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            key,
            msg,
        };

        if self.control_device.is_empty() {
            return Err(invalid("control_device", "must not be empty".into()));
        }

        if self.storage.dataset_root.is_empty() {
            return Err(invalid(
                "storage.dataset_root",
                "must not be empty".into(),
            ));
        }

        validate_size(&self.storage.disk_size)
            .map_err(|msg| invalid("storage.disk_size", msg))?;

        if self.vmnic.driver.is_empty() {
            return Err(invalid("vmnic.driver", "must not be empty".into()));
        }

        if self.vmnic.queues == 0 || self.vmnic.queues > MAX_VMNIC_QUEUES {
            return Err(invalid(
                "vmnic.queues",
                format!("must be in 1..={MAX_VMNIC_QUEUES}"),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defaults_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = vec![dir.path().join(CONFIG_FILE)];
        let (cfg, from) = Config::load_from(None, &missing).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.control_device, "/dev/vpcctl");
        assert!(from.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            CONFIG_FILE,
            r#"
            control_device = "/dev/vpcctl1"

            [log]
            level = "warn"

            [storage]
            disk_size = "10G"
            "#,
        );

        let (cfg, from) = Config::load_from(None, &[path.clone()]).unwrap();
        assert_eq!(from, Some(path));
        assert_eq!(cfg.control_device, "/dev/vpcctl1");
        assert_eq!(cfg.log.level, LogLevel::Warning);
        assert_eq!(cfg.log.format, LogFormat::Auto);
        assert_eq!(cfg.storage.disk_size, "10G");
        assert_eq!(cfg.storage.dataset_root, "zroot/vpc/guests");
        assert_eq!(cfg.vmnic, VmnicConfig::default());
    }

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.toml");
        let b = write_config(dir.path(), "b.toml", "[vmnic]\nqueues = 4\n");
        let c = write_config(dir.path(), "c.toml", "[vmnic]\nqueues = 8\n");

        let (cfg, from) = Config::load_from(None, &[a, b.clone(), c]).unwrap();
        assert_eq!(from, Some(b));
        assert_eq!(cfg.vmnic.queues, 4);
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load_from(Some(&missing), &[]).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let text = "[storage]\npool = \"tank\"\n";
        let path = write_config(dir.path(), CONFIG_FILE, text);
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn values_are_validated() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_config(dir.path(), "q.toml", "[vmnic]\nqueues = 0\n");
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "vmnic.queues", .. }
        ));

        let text = "[storage]\ndisk_size = \"lots\"\n";
        let path = write_config(dir.path(), "s.toml", text);
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "storage.disk_size", .. }
        ));
    }

    #[test]
    fn search_paths_prefer_home() {
        let paths = Config::search_paths(Some(Path::new("/home/op")));
        assert_eq!(paths[0], PathBuf::from("/home/op/.config/vpc/vpc.toml"));
        assert_eq!(paths[1], PathBuf::from("./vpc.toml"));
        assert_eq!(Config::search_paths(None).len(), 1);
    }
}
