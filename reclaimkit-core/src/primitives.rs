use alloy_primitives::{Address, Signature};
use std::str::FromStr;

use crate::error::ReclaimError;

/// A trait for parsing primitive types from caller provided strings.
///
/// Application ids, witness addresses and signatures travel as hex strings in every
/// wire format of the network. For example, parsing a stringified address into an
/// `Address` type.
///
/// # Examples
/// ```rust,ignore
/// let address = Address::parse_from_input("0x1234567890abcdef", "address");
/// ```
///
/// # Errors
/// - `ReclaimError::InvalidInput` if the provided string is not valid for the type.
pub trait ParseFromInput {
    /// Parses `s`, naming `attr` in the error when it is invalid.
    ///
    /// # Errors
    /// Returns `InvalidInput` if `s` is not a valid value.
    fn parse_from_input(s: &str, attr: &'static str) -> Result<Self, ReclaimError>
    where
        Self: Sized;
}

impl ParseFromInput for Address {
    fn parse_from_input(s: &str, attr: &'static str) -> Result<Self, ReclaimError> {
        Self::from_str(s.trim()).map_err(|e| ReclaimError::InvalidInput {
            attribute: attr.to_string(),
            reason: e.to_string(),
        })
    }
}

impl ParseFromInput for Signature {
    fn parse_from_input(s: &str, attr: &'static str) -> Result<Self, ReclaimError> {
        let invalid = |reason: String| ReclaimError::InvalidInput {
            attribute: attr.to_string(),
            reason,
        };
        let s = s.trim().trim_matches('"');
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|e| invalid(e.to_string()))?;
        if bytes.len() != 65 {
            return Err(invalid(format!("expected 65 bytes, got {}", bytes.len())));
        }
        Self::from_raw(&bytes).map_err(|e| invalid(e.to_string()))
    }
}

/// Encodes a recoverable signature as `0x`-prefixed `r || s || v` hex, `v` in `{27, 28}`.
#[must_use]
pub fn signature_to_hex(signature: &Signature) -> String {
    format!("0x{}", hex::encode(signature.as_bytes()))
}
