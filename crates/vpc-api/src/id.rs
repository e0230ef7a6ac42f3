// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Resource identity.
//!
//! Every switch, port, vmnic, and ethlink is named by a 128-bit
//! random identifier. Operators may supply their own, in which case
//! it is parsed and canonicalized here; otherwise one is drawn from
//! the OS entropy source.

use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::str::FromStr;
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Errors produced while minting or parsing an identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IdError {
    /// The OS entropy source could not be read. This is not
    /// retryable.
    Entropy(String),

    /// The operator-supplied string is not a valid identifier.
    Invalid { raw: String, reason: String },
}

impl Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Entropy(msg) => {
                write!(f, "unable to read secure random bytes: {msg}")
            }
            Self::Invalid { raw, reason } => {
                write!(f, "invalid identifier {raw:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for IdError {}

/// Produce a fresh random (version 4) identifier.
pub fn new_id<T: From<Uuid>>() -> Result<T, IdError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| IdError::Entropy(e.to_string()))?;
    Ok(T::from(uuid::Builder::from_random_bytes(bytes).into_uuid()))
}

/// Parse an operator-supplied identifier.
///
/// Both the hyphenated and simple forms are accepted, in any case.
/// The nil UUID is rejected.
pub fn parse_id<T: From<Uuid>>(raw: &str) -> Result<T, IdError> {
    let trimmed = raw.trim();
    let id = Uuid::try_parse(trimmed).map_err(|e| IdError::Invalid {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;

    if id.is_nil() {
        return Err(IdError::Invalid {
            raw: raw.to_string(),
            reason: "the nil identifier is reserved".to_string(),
        });
    }

    Ok(T::from(id))
}

macro_rules! resource_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(
            Clone,
            Copy,
            Deserialize,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a new random identifier.
            pub fn new() -> Result<Self, IdError> {
                new_id()
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_id(s)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0.hyphenated())
            }
        }
    };
}

resource_id!(
    /// Identifies a virtual switch.
    SwitchId
);
resource_id!(
    /// Identifies a port on a virtual switch.
    PortId
);
resource_id!(
    /// Identifies a VM network interface.
    VmnicId
);
resource_id!(
    /// Identifies an uplink attachment to a host link.
    EthlinkId
);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_canonicalizes() {
        let id: SwitchId =
            parse_id("DA64C3F3-095D-91E5-DF13-5AABCFC52468").unwrap();
        assert_eq!(id.to_string(), "da64c3f3-095d-91e5-df13-5aabcfc52468");

        let simple: SwitchId =
            parse_id("da64c3f3095d91e5df135aabcfc52468").unwrap();
        assert_eq!(id, simple);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_id::<PortId>("not-a-uuid"),
            Err(IdError::Invalid { .. })
        ));
        assert!(matches!(parse_id::<PortId>(""), Err(IdError::Invalid { .. })));
        assert!(matches!(
            parse_id::<PortId>("00000000-0000-0000-0000-000000000000"),
            Err(IdError::Invalid { .. })
        ));
    }

    #[test]
    fn new_ids_are_v4_and_distinct() {
        let a = VmnicId::new().unwrap();
        let b = VmnicId::new().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn serde_is_transparent() {
        let id: EthlinkId =
            "5c4acd32-1b8d-11e8-b4c7-0cc47a6c7d1e".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"5c4acd32-1b8d-11e8-b4c7-0cc47a6c7d1e\"");
    }
}
