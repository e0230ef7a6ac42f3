// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::str::FromStr;
use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;

/// A MAC address.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Hash,
)]
pub struct MacAddr {
    inner: [u8; 6],
}

impl MacAddr {
    pub const ZERO: Self = Self { inner: [0x00; 6] };

    /// Return the bytes of the MAC address.
    #[inline]
    pub fn bytes(&self) -> [u8; 6] {
        self.inner
    }

    pub const fn from_const(bytes: [u8; 6]) -> Self {
        Self { inner: bytes }
    }

    /// Generate a random, locally administered, unicast address.
    pub fn random_local(rng: &mut impl RngCore) -> Self {
        let mut inner = [0u8; 6];
        rng.fill_bytes(&mut inner);
        inner[0] = (inner[0] | 0x02) & !0x01;
        Self { inner }
    }

    pub fn is_multicast(&self) -> bool {
        self.inner[0] & 0x01 != 0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        Self { inner: bytes }
    }
}

impl FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<u8> = s
            .split(':')
            .map(|s| {
                u8::from_str_radix(s, 16).map_err(|_| format!("bad octet: {s}"))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        if octets.len() != 6 {
            return Err(format!("incorrect number of bytes: {}", octets.len()));
        }

        let bytes =
            [octets[0], octets[1], octets[2], octets[3], octets[4], octets[5]];

        Ok(MacAddr { inner: bytes })
    }
}

impl Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.inner[0],
            self.inner[1],
            self.inner[2],
            self.inner[3],
            self.inner[4],
            self.inner[5]
        )
    }
}

// There's no reason to view the MAC address as its raw array, so just
// present it in a human-friendly manner.
impl Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MacAddr {{ inner: {self} }}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_display() {
        let mac: MacAddr = "A8:40:25:00:00:01".parse().unwrap();
        assert_eq!(mac.bytes(), [0xa8, 0x40, 0x25, 0x00, 0x00, 0x01]);
        assert_eq!(mac.to_string(), "a8:40:25:00:00:01");
    }

    #[test]
    fn parse_rejects_short_and_bad_octets() {
        assert!("a8:40:25:00:00".parse::<MacAddr>().is_err());
        assert!("a8:40:25:00:00:zz".parse::<MacAddr>().is_err());
    }

    #[test]
    fn random_local_is_unicast_and_local() {
        let mut rng = rand::rng();
        for _ in 0..32 {
            let mac = MacAddr::random_local(&mut rng);
            assert!(!mac.is_multicast());
            assert_eq!(mac.bytes()[0] & 0x02, 0x02);
        }
    }
}
