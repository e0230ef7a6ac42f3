// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// A Virtual Network Identifier.
///
/// The VNI is a 24-bit value carried in the VXLAN header; it is the
/// uniqueness key among active switches.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct Vni {
    inner: u32,
}

impl Vni {
    pub const MAX: u32 = (1 << 24) - 1;

    /// Attempt to create a new VNI from any value which can be
    /// converted to a `u32`.
    pub fn new<N: Into<u32>>(val: N) -> Result<Self, String> {
        let val = val.into();
        if val > Self::MAX {
            return Err(format!("VNI value exceeds maximum: {val}"));
        }

        Ok(Vni { inner: val })
    }
}

impl TryFrom<u32> for Vni {
    type Error = String;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        Self::new(val)
    }
}

impl From<Vni> for u32 {
    fn from(vni: Vni) -> u32 {
        vni.inner
    }
}

impl FromStr for Vni {
    type Err = String;

    fn from_str(val: &str) -> Result<Self, Self::Err> {
        let n = val.parse::<u32>().map_err(|e| e.to_string())?;
        Self::new(n)
    }
}

impl Display for Vni {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Debug for Vni {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Vni {{ inner: {self} }}")
    }
}
