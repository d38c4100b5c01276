//! Fixed-point text encoding for satoshi amounts.
//!
//! Any JSON-facing collaborator exchanges amounts as a decimal string with
//! exactly eight fractional digits and no separators, e.g. `510000001` sats is
//! `"5.10000001"`. Parsing drops the decimal point and reads the base-unit
//! integer back.

use crate::errors::LedgerError;

pub const SATS_PER_BTC: u64 = 100_000_000;
pub const DECIMALS: usize = 8;

#[must_use]
pub fn format_amount(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}

pub fn parse_amount(s: &str) -> Result<u64, LedgerError> {
    let s = s.trim();
    let (int_part, frac_part) = s
        .split_once('.')
        .ok_or_else(|| LedgerError::InvalidAmount(format!("missing decimal point in '{s}'")))?;

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LedgerError::InvalidAmount(format!(
            "invalid integer part in '{s}'"
        )));
    }

    if frac_part.len() != DECIMALS || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LedgerError::InvalidAmount(format!(
            "expected exactly {DECIMALS} fractional digits in '{s}'"
        )));
    }

    format!("{int_part}{frac_part}")
        .parse::<u64>()
        .map_err(|e| LedgerError::InvalidAmount(format!("'{s}': {e}")))
}

/// `#[serde(with = "types::amount::serde_str")]` adapter for `u64` sat fields.
pub mod serde_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(sats: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_amount(*sats))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_amount(&s).map_err(serde::de::Error::custom)
    }
}
