//! Token registry and human-amount parsing.

use crate::error::OrderError;
use condswap_core::TokenConfig;
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

/// Resolved token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: String,
    pub address: Address,
    pub decimals: u32,
}

impl From<&TokenConfig> for Token {
    fn from(config: &TokenConfig) -> Self {
        Self {
            symbol: config.symbol.clone(),
            address: config.address,
            decimals: config.decimals,
        }
    }
}

/// Tokens the service will build orders for, addressable by symbol or address.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    by_symbol: HashMap<String, Token>,
    by_address: HashMap<Address, Token>,
}

impl TokenRegistry {
    #[must_use]
    pub fn new(tokens: &[TokenConfig]) -> Self {
        let mut registry = Self::default();
        for config in tokens {
            let token = Token::from(config);
            registry
                .by_symbol
                .insert(token.symbol.to_ascii_uppercase(), token.clone());
            registry.by_address.insert(token.address, token);
        }
        registry
    }

    /// Resolves a case-insensitive symbol or a `0x` address.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAsset` if the token is not registered.
    pub fn resolve(&self, symbol_or_address: &str) -> Result<&Token, OrderError> {
        let key = symbol_or_address.trim();
        let found = if key.starts_with("0x") || key.starts_with("0X") {
            Address::from_str(key)
                .ok()
                .and_then(|addr| self.by_address.get(&addr))
        } else {
            self.by_symbol.get(&key.to_ascii_uppercase())
        };
        found.ok_or_else(|| OrderError::UnknownAsset(key.to_string()))
    }

    #[must_use]
    pub fn by_address(&self, address: &Address) -> Option<&Token> {
        self.by_address.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.by_symbol.values()
    }
}

/// Converts a human decimal amount into base units.
///
/// # Errors
///
/// Returns `InvalidAmount` for non-numeric, non-positive, or over-precise input.
pub fn parse_amount(raw: &str, decimals: u32) -> Result<U256, OrderError> {
    let trimmed = raw.trim();
    let amount = Decimal::from_str(trimmed)
        .map_err(|_| OrderError::InvalidAmount(format!("'{trimmed}' is not a decimal number")))?;

    if amount.is_sign_negative() || amount.is_zero() {
        return Err(OrderError::InvalidAmount(format!("'{trimmed}' must be positive")));
    }

    let amount = amount.normalize();
    let scale = amount.scale();
    if scale > decimals {
        return Err(OrderError::InvalidAmount(format!(
            "'{trimmed}' has {scale} decimal places, token supports {decimals}"
        )));
    }

    let mantissa = u128::try_from(amount.mantissa())
        .map_err(|_| OrderError::InvalidAmount(format!("'{trimmed}' is out of range")))?;
    U256::from(mantissa)
        .checked_mul(U256::exp10((decimals - scale) as usize))
        .ok_or_else(|| OrderError::InvalidAmount(format!("'{trimmed}' overflows uint256")))
}

/// Formats base units back into a human decimal string without trailing zeros.
#[must_use]
pub fn format_amount(base_units: U256, decimals: u32) -> String {
    let digits = base_units.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condswap_core::config::default_tokens;
    use rust_decimal_macros::dec;

    #[test]
    fn resolves_symbol_case_insensitively() {
        let registry = TokenRegistry::new(&default_tokens());
        let usdc = registry.resolve("usdc").unwrap();
        assert_eq!(usdc.decimals, 6);
        assert_eq!(registry.resolve("USDC").unwrap(), usdc);
    }

    #[test]
    fn resolves_registered_address() {
        let registry = TokenRegistry::new(&default_tokens());
        let weth = registry
            .resolve("0x4200000000000000000000000000000000000006")
            .unwrap();
        assert_eq!(weth.symbol, "WETH");
    }

    #[test]
    fn unknown_symbol_and_address_are_rejected() {
        let registry = TokenRegistry::new(&default_tokens());
        assert!(matches!(registry.resolve("DOGE"), Err(OrderError::UnknownAsset(_))));
        assert!(matches!(
            registry.resolve("0x0000000000000000000000000000000000000001"),
            Err(OrderError::UnknownAsset(_))
        ));
        assert!(registry.resolve("0xnothex").is_err());
    }

    #[test]
    fn parses_amounts_into_base_units() {
        assert_eq!(parse_amount("0.1", 6).unwrap(), U256::from(100_000u64));
        assert_eq!(
            parse_amount("0.00003", 18).unwrap(),
            U256::from(30_000_000_000_000u64)
        );
        assert_eq!(parse_amount("2.500", 6).unwrap(), U256::from(2_500_000u64));
        assert_eq!(parse_amount("15", 0).unwrap(), U256::from(15u64));
    }

    #[test]
    fn rejects_bad_amounts() {
        for raw in ["", "abc", "-1", "0", "0.0", "1.0000001"] {
            assert!(
                matches!(parse_amount(raw, 6), Err(OrderError::InvalidAmount(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn parses_decimal_display_form() {
        for (amount, expected) in [(dec!(1.5), 1_500_000u64), (dec!(0.000001), 1), (dec!(250), 250_000_000)] {
            assert_eq!(parse_amount(&amount.to_string(), 6).unwrap(), U256::from(expected));
        }
    }

    #[test]
    fn format_round_trips_parse() {
        assert_eq!(format_amount(U256::from(100_000u64), 6), "0.1");
        assert_eq!(format_amount(U256::from(2_000_000u64), 6), "2");
        assert_eq!(format_amount(U256::from(5u64), 6), "0.000005");
    }
}
