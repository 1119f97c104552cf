//! Function selectors
//!
//! A selector is the first four bytes of the keccak-256 hash of a canonical
//! function signature such as `transfer(address,uint256)`. It is the unit of
//! routing inside a diamond.

use alloy_primitives::keccak256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 4-byte function selector, rendered as `0x` + 8 lowercase hex digits
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector([u8; 4]);

/// Error parsing a selector from text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid selector {input:?}: {reason}")]
pub struct SelectorParseError {
    pub input: String,
    pub reason: &'static str,
}

impl Selector {
    /// The all-zero selector, used as the "no send function" sentinel
    pub const ZERO: Selector = Selector([0; 4]);

    /// Wrap raw selector bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Compute the selector of a canonical signature
    pub fn from_signature(signature: &str) -> Self {
        let hash = keccak256(signature.as_bytes());
        Self([hash[0], hash[1], hash[2], hash[3]])
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl FromStr for Selector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 8 {
            return Err(SelectorParseError {
                input: s.to_string(),
                reason: "expected 8 hex digits",
            });
        }
        let mut bytes = [0u8; 4];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| SelectorParseError {
            input: s.to_string(),
            reason: "not hexadecimal",
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
