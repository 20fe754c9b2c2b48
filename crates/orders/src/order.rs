use crate::extension::{self, Extension};
use crate::maker_traits::MakerTraits;
use crate::predicate::{decode_predicate, DecodedPredicate};
use condswap_core::units::u256_dec;
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// A v4 limit order as signed by the maker and accepted by the order book.
///
/// Numeric fields serialize as decimal strings, addresses as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrder {
    #[serde(with = "u256_dec")]
    pub salt: U256,
    pub maker: Address,
    pub receiver: Address,
    pub maker_asset: Address,
    pub taker_asset: Address,
    #[serde(with = "u256_dec")]
    pub making_amount: U256,
    #[serde(with = "u256_dec")]
    pub taking_amount: U256,
    pub maker_traits: MakerTraits,
    #[serde(default)]
    pub extension: Bytes,
}

impl LimitOrder {
    /// Expiration timestamp from the maker traits, 0 for none.
    #[must_use]
    pub fn expiration(&self) -> u64 {
        self.maker_traits.expiration()
    }

    #[must_use]
    pub fn nonce(&self) -> u64 {
        self.maker_traits.nonce()
    }

    /// Decoded predicate, if the extension carries one this service can read.
    #[must_use]
    pub fn predicate(&self) -> Option<DecodedPredicate> {
        let ext = Extension::decode(&self.extension).ok()?;
        decode_predicate(&ext.predicate)
    }

    /// Structural checks the protocol performs before it ever looks at a signature.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated rule.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.making_amount.is_zero() || self.taking_amount.is_zero() {
            return Err("amounts must be positive".into());
        }
        if self.maker_asset == self.taker_asset {
            return Err("maker and taker assets must differ".into());
        }
        if self.maker_traits.has_extension() == self.extension.is_empty() {
            return Err("has-extension flag disagrees with extension bytes".into());
        }
        if !extension::salt_matches(self.salt, &self.extension) {
            return Err("salt does not bind the extension hash".into());
        }
        Ok(())
    }
}
