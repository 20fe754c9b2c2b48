//! Maker signature parsing and recovery.

use crate::error::OrderError;
use ethers::types::{Address, RecoveryMessage, Signature, H256};
use std::str::FromStr;

/// Parses a 65-byte `0x{r}{s}{v}` signature. `v` of 0/1 is normalized to 27/28.
///
/// # Errors
///
/// Returns `Validation` for malformed hex or wrong length.
pub fn parse_signature(raw: &str) -> Result<Signature, OrderError> {
    let trimmed = raw.trim();
    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_str)
        .map_err(|e| OrderError::Validation(format!("signature is not hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(OrderError::Validation(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }

    let mut normalized = bytes;
    if normalized[64] < 27 {
        normalized[64] += 27;
    }
    Signature::try_from(normalized.as_slice())
        .map_err(|e| OrderError::Validation(format!("invalid signature: {e}")))
}

/// Recovers the address that signed `order_hash`.
///
/// # Errors
///
/// Returns `Validation` if recovery fails.
pub fn recover_signer(order_hash: H256, signature: &Signature) -> Result<Address, OrderError> {
    signature
        .recover(RecoveryMessage::Hash(order_hash))
        .map_err(|e| OrderError::Validation(format!("signature recovery failed: {e}")))
}

/// Checks that `signature` over `order_hash` was produced by `maker`.
///
/// # Errors
///
/// Returns `Validation` naming both addresses on mismatch.
pub fn verify_maker(order_hash: H256, signature: &Signature, maker: Address) -> Result<(), OrderError> {
    let signer = recover_signer(order_hash, signature)?;
    if signer == maker {
        Ok(())
    } else {
        Err(OrderError::Validation(format!(
            "signature was produced by {signer:?}, expected maker {maker:?}"
        )))
    }
}

/// Parses a `0x`-prefixed 32-byte hash.
///
/// # Errors
///
/// Returns `Validation` when the input is not 32 bytes of hex.
pub fn parse_hash(raw: &str) -> Result<H256, OrderError> {
    let trimmed = raw.trim();
    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_str.len() != 64 {
        return Err(OrderError::Validation(format!("'{trimmed}' is not a 32-byte hash")));
    }
    H256::from_str(hex_str).map_err(|e| OrderError::Validation(format!("invalid hash: {e}")))
}

/// Parses a `0x` address.
///
/// # Errors
///
/// Returns `Validation` for anything other than 20 bytes of hex.
pub fn parse_address(field: &str, raw: &str) -> Result<Address, OrderError> {
    let trimmed = raw.trim();
    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_str.len() != 40 {
        return Err(OrderError::Validation(format!("{field} '{trimmed}' is not an address")));
    }
    Address::from_str(hex_str)
        .map_err(|_| OrderError::Validation(format!("{field} '{trimmed}' is not an address")))
}
