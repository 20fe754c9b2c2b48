//! uint256 helpers shared by the API and the order types.
//!
//! Amounts, thresholds, salts and traits travel as decimal strings in JSON so
//! that JavaScript clients never see a lossy float.

use ethers::types::U256;

/// Parses a uint256 from a decimal string or a `0x`-prefixed hex string.
///
/// Returns `None` for empty input, signs, fractions, or overflow.
#[must_use]
pub fn parse_u256(raw: &str) -> Option<U256> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() || hex.len() > 64 {
            return None;
        }
        return U256::from_str_radix(hex, 16).ok();
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_dec_str(s).ok()
}

/// `#[serde(with = "u256_dec")]`: decimal string out, decimal/hex string or integer in.
pub mod u256_dec {
    use super::parse_u256;
    use ethers::types::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Int(v) => Ok(U256::from(v)),
            Raw::Str(s) => parse_u256(&s)
                .ok_or_else(|| de::Error::custom(format!("invalid uint256 '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_u256("1500"), Some(U256::from(1500)));
        assert_eq!(parse_u256("0x5dc"), Some(U256::from(1500)));
        assert_eq!(parse_u256(" 42 "), Some(U256::from(42)));
    }

    #[test]
    fn rejects_signs_fractions_and_garbage() {
        assert_eq!(parse_u256("-1"), None);
        assert_eq!(parse_u256("1.5"), None);
        assert_eq!(parse_u256("abc"), None);
        assert_eq!(parse_u256(""), None);
        assert_eq!(parse_u256("0x"), None);
    }

    #[test]
    fn rejects_overflow() {
        let too_big = format!("{}0", U256::MAX);
        assert_eq!(parse_u256(&too_big), None);
    }
}
