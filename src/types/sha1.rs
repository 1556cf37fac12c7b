use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CodevError;

/// A SHA-1 digest.
///
/// Displayed and serialized as 40 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha1Hash([u8; 20]);

impl Sha1Hash {
    /// Number of hex digits in the textual form.
    pub const HEX_DIGITS: usize = 40;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse a hex digest whose leading zeros may have been stripped.
    ///
    /// Some servers publish `.sha1` sidecars as a number rather than a fixed
    /// width string; the value is left-padded with `0` before parsing.
    pub fn from_stripped_hex(hex: &str) -> Result<Self, CodevError> {
        let hex = hex.trim();
        if hex.len() >= Self::HEX_DIGITS {
            return hex.parse();
        }
        format!("{hex:0>width$}", width = Self::HEX_DIGITS).parse()
    }
}

impl FromStr for Sha1Hash {
    type Err = CodevError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| CodevError::InvalidChecksum(format!("{s:?}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Sha1Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Sha1Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha1Hash({self})")
    }
}

impl Serialize for Sha1Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Sha1Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
