//! Tenant addressing.
//!
//! An address is the opaque external identifier that names a seed-bearing
//! tenant: `0x` followed by 40 hex characters, case-insensitive on input and
//! canonically lowercase everywhere the broker emits or persists it. Strings
//! that do not match this syntax are routed to raw blob storage instead of
//! the derivation path.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const ADDRESS_BYTES: usize = 20;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    /// Parse an address from its canonical string form.
    ///
    /// Returns `None` when the string does not match the address syntax;
    /// callers use this as the raw-vs-derived routing predicate.
    pub fn parse(s: &str) -> Option<Self> {
        let hex_part = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
        if hex_part.len() != ADDRESS_BYTES * 2 {
            return None;
        }
        let mut bytes = [0u8; ADDRESS_BYTES];
        hex::decode_to_slice(hex_part, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// Whether `s` matches the seed-bearing address syntax.
    pub fn is_address(s: &str) -> bool {
        Self::parse(s).is_some()
    }

    pub const fn from_bytes(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| D::Error::custom(format!("invalid address: {s:?}")))
    }
}
