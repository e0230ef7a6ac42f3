// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types shared between the VPC control tools and the VPC switch
//! driver.
//!
//! Everything in this crate may cross the ioctl boundary, so any
//! change to a type here must be paired with a bump of
//! [`API_VERSION`].

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub mod cmd;
pub mod id;
pub mod mac;
pub mod resource;
pub mod vni;

pub use cmd::*;
pub use id::*;
pub use mac::*;
pub use resource::*;
pub use vni::*;

/// The overall version of the API. Anytime an API is added, removed,
/// or modified, this number should increment. Currently we attach no
/// semantic meaning to the number other than as a means to verify
/// that the user and kernel are compiled for the same API.
pub const API_VERSION: u64 = 4;

/// Major version of the vpcadm package.
pub const MAJOR_VERSION: u64 = 0;

/// The kinds of resource tracked by the switch driver.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum ResourceKind {
    Switch = 1,
    Port = 2,
    Vmnic = 3,
    Ethlink = 4,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] =
        [Self::Switch, Self::Port, Self::Vmnic, Self::Ethlink];
}

impl core::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "switch" | "sw" => Ok(Self::Switch),
            "port" => Ok(Self::Port),
            "vmnic" => Ok(Self::Vmnic),
            "ethlink" => Ok(Self::Ethlink),
            _ => Err(format!("invalid resource kind: {s}")),
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Switch => "switch",
            Self::Port => "port",
            Self::Vmnic => "vmnic",
            Self::Ethlink => "ethlink",
        };

        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_from_str() {
        assert_eq!("SW".parse::<ResourceKind>(), Ok(ResourceKind::Switch));
        assert_eq!(
            "ethlink".parse::<ResourceKind>(),
            Ok(ResourceKind::Ethlink)
        );
        assert!("bridge".parse::<ResourceKind>().is_err());
    }
}
