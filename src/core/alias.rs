//! Bridge address aliasing
//!
//! Some rollup bridges rewrite the sender of an L1-originated message by adding
//! a fixed offset to it. The receiving satellite must be told the rewritten
//! address, computed here with unsigned 160-bit wrap-around.

use alloy_primitives::{Address, U256};

use crate::error::{Result, SatError};

/// `(address + shift) mod 2^160`
pub fn alias(address: Address, shift: U256) -> Address {
    let sum = U256::from_be_slice(address.as_slice()).wrapping_add(shift);
    let word = sum.to_be_bytes::<32>();
    Address::from_slice(&word[12..])
}

/// Parse an alias shift given as `0x`-prefixed hex or as a decimal integer
pub fn parse_shift(input: &str) -> Result<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SatError::Config("alias shift is empty".into()));
    }
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(digits) => U256::from_str_radix(digits, 16),
        None => U256::from_str_radix(trimmed, 10),
    };
    parsed.map_err(|e| SatError::Config(format!("invalid alias shift {:?}: {}", input, e)))
}
