// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A recording volume manager.

use std::collections::BTreeSet;
use std::sync::Mutex;
use vpc::volume::Provisioned;
use vpc::volume::VolumeError;
use vpc::volume::VolumeManager;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VolumeCall {
    Filesystem(String),
    Volume { name: String, size: String },
}

#[derive(Default)]
struct Inner {
    existing: BTreeSet<String>,
    failing: BTreeSet<String>,
    calls: Vec<VolumeCall>,
}

#[derive(Default)]
pub struct MemVolumes {
    inner: Mutex<Inner>,
}

impl MemVolumes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `name` already exists.
    pub fn add_existing(&self, name: &str) {
        self.inner.lock().unwrap().existing.insert(name.to_string());
    }

    /// Fail any request to create `name`.
    pub fn fail_on(&self, name: &str) {
        self.inner.lock().unwrap().failing.insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<VolumeCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inner.lock().unwrap().existing.contains(name)
    }

    fn ensure(
        &self,
        what: &'static str,
        name: &str,
        call: VolumeCall,
    ) -> Result<Provisioned, VolumeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);

        if inner.existing.contains(name) {
            return Ok(Provisioned::Existing);
        }

        if inner.failing.contains(name) {
            return Err(VolumeError::Create {
                what,
                name: name.to_string(),
                msg: "out of space".to_string(),
            });
        }

        inner.existing.insert(name.to_string());
        Ok(Provisioned::Created)
    }
}

impl VolumeManager for MemVolumes {
    fn ensure_filesystem(
        &self,
        name: &str,
    ) -> Result<Provisioned, VolumeError> {
        let call = VolumeCall::Filesystem(name.to_string());
        self.ensure("filesystem", name, call)
    }

    fn ensure_volume(
        &self,
        name: &str,
        size: &str,
    ) -> Result<Provisioned, VolumeError> {
        self.ensure(
            "volume",
            name,
            VolumeCall::Volume {
                name: name.to_string(),
                size: size.to_string(),
            },
        )
    }
}
