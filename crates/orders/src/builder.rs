//! Assembles conditional limit orders.
//!
//! A draft is resolved against the token registry and the oracle, its
//! condition is encoded into the extension predicate, and the canonical hash
//! is computed under the same domain the settlement protocol verifies with.

use crate::eip712::{self, Eip712Domain};
use crate::error::OrderError;
use crate::extension::{self, Extension};
use crate::maker_traits::{MakerTraits, MAX_EXPIRATION, MAX_NONCE};
use crate::order::LimitOrder;
use crate::predicate::encode_predicate;
use crate::tokens::{parse_amount, Token, TokenRegistry};
use condswap_core::Condition;
use condswap_oracle::{OracleError, OracleReader};
use ethers::types::{Address, Bytes, H256, U256};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Longest accepted order lifetime.
pub const MAX_EXPIRATION_HOURS: u64 = 24 * 365;

const SECS_PER_HOUR: u64 = 3_600;

/// Caller-facing order parameters before resolution.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub from_token: String,
    pub to_token: String,
    /// Human amount of `from_token` offered.
    pub amount: String,
    /// Human amount of `to_token` expected in return.
    pub expected_amount: String,
    pub condition: Condition,
    pub expiration_hours: u64,
    pub maker: Address,
    pub receiver: Option<Address>,
    pub allow_partial_fills: bool,
    pub allow_multiple_fills: bool,
}

/// A draft whose tokens and amounts have been resolved.
#[derive(Debug, Clone)]
pub struct ResolvedDraft {
    pub maker_token: Token,
    pub taker_token: Token,
    pub making_amount: U256,
    pub taking_amount: U256,
}

/// Randomness and clock inputs, split out so builds can be reproduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSeed {
    pub nonce: u64,
    /// Upper 96 bits of the salt.
    pub salt_entropy: U256,
    pub now_secs: u64,
}

impl OrderSeed {
    /// 40-bit random nonce, 96 random salt bits, wall-clock time.
    #[must_use]
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let high: u32 = rng.gen();
        let low: u64 = rng.gen();
        Self {
            nonce: rng.gen_range(0..=MAX_NONCE),
            salt_entropy: (U256::from(high) << 64) | U256::from(low),
            now_secs: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuiltOrder {
    pub order: LimitOrder,
    pub order_hash: H256,
    pub typed_data: Value,
    pub predicate: Bytes,
    pub condition: Condition,
    pub maker_token: Token,
    pub taker_token: Token,
}

pub struct OrderBuilder {
    domain: Eip712Domain,
    tokens: TokenRegistry,
    oracle: Arc<dyn OracleReader>,
}

impl OrderBuilder {
    #[must_use]
    pub fn new(domain: Eip712Domain, tokens: TokenRegistry, oracle: Arc<dyn OracleReader>) -> Self {
        Self {
            domain,
            tokens,
            oracle,
        }
    }

    #[must_use]
    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    #[must_use]
    pub fn oracle(&self) -> &Arc<dyn OracleReader> {
        &self.oracle
    }

    /// Shape checks with no I/O.
    ///
    /// # Errors
    ///
    /// `UnknownAsset`, `InvalidAmount`, or `Validation`.
    pub fn resolve(&self, draft: &OrderDraft) -> Result<ResolvedDraft, OrderError> {
        let maker_token = self.tokens.resolve(&draft.from_token)?.clone();
        let taker_token = self.tokens.resolve(&draft.to_token)?.clone();
        if maker_token.address == taker_token.address {
            return Err(OrderError::Validation(
                "fromToken and toToken must differ".into(),
            ));
        }

        let making_amount = parse_amount(&draft.amount, maker_token.decimals)?;
        let taking_amount = parse_amount(&draft.expected_amount, taker_token.decimals)?;

        if draft.expiration_hours == 0 || draft.expiration_hours > MAX_EXPIRATION_HOURS {
            return Err(OrderError::Validation(format!(
                "expirationHours must be between 1 and {MAX_EXPIRATION_HOURS}"
            )));
        }
        if draft.maker.is_zero() {
            return Err(OrderError::Validation("makerAddress cannot be zero".into()));
        }

        Ok(ResolvedDraft {
            maker_token,
            taker_token,
            making_amount,
            taking_amount,
        })
    }

    /// Builds with fresh randomness.
    ///
    /// # Errors
    ///
    /// See [`OrderBuilder::build_with_seed`].
    pub async fn build(&self, draft: &OrderDraft) -> Result<BuiltOrder, OrderError> {
        self.build_with_seed(draft, OrderSeed::random()).await
    }

    /// # Errors
    ///
    /// Resolution errors, `UnknownIndex` for an unassigned or inactive index,
    /// `OracleUnavailable` if the oracle cannot be asked.
    pub async fn build_with_seed(
        &self,
        draft: &OrderDraft,
        seed: OrderSeed,
    ) -> Result<BuiltOrder, OrderError> {
        let resolved = self.resolve(draft)?;

        let index_id = draft.condition.index_id;
        if !self.oracle.is_valid_index(index_id).await? {
            return Err(OracleError::UnknownIndex(index_id).into());
        }

        let predicate = encode_predicate(
            &draft.condition,
            self.domain.verifying_contract,
            self.oracle.contract_address(),
        );
        let extension = Extension::with_predicate(predicate.clone()).encode()?;

        let expiration = seed
            .now_secs
            .checked_add(draft.expiration_hours * SECS_PER_HOUR)
            .filter(|e| *e <= MAX_EXPIRATION)
            .ok_or_else(|| OrderError::Validation("expiration out of range".into()))?;

        let maker_traits = MakerTraits::new()
            .with_partial_fills(draft.allow_partial_fills)
            .with_multiple_fills(draft.allow_multiple_fills)
            .with_extension(true)
            .with_expiration(expiration)
            .with_nonce(seed.nonce & MAX_NONCE);

        let order = LimitOrder {
            salt: extension::salt_for(&extension, seed.salt_entropy),
            maker: draft.maker,
            receiver: draft.receiver.unwrap_or_else(Address::zero),
            maker_asset: resolved.maker_token.address,
            taker_asset: resolved.taker_token.address,
            making_amount: resolved.making_amount,
            taking_amount: resolved.taking_amount,
            maker_traits,
            extension,
        };

        let order_hash = eip712::order_hash(&order, &self.domain);
        let typed_data = eip712::typed_data(&order, &self.domain);

        debug!(
            order_hash = ?order_hash,
            maker = ?order.maker,
            index_id,
            operator = %draft.condition.operator,
            expiration,
            "Built conditional order"
        );

        Ok(BuiltOrder {
            order,
            order_hash,
            typed_data,
            predicate,
            condition: draft.condition,
            maker_token: resolved.maker_token,
            taker_token: resolved.taker_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condswap_core::config::default_tokens;
    use condswap_core::{AppConfig, Operator};
    use condswap_oracle::{InMemoryFeed, IndexRegistry};

    fn builder() -> OrderBuilder {
        let config = AppConfig::default();
        let oracle = IndexRegistry::new(
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x0c),
            Arc::new(InMemoryFeed::new()),
        );
        OrderBuilder::new(
            Eip712Domain::from_config(&config.protocol, config.chain.chain_id),
            TokenRegistry::new(&default_tokens()),
            Arc::new(oracle),
        )
    }

    fn draft() -> OrderDraft {
        OrderDraft {
            from_token: "USDC".into(),
            to_token: "WETH".into(),
            amount: "0.1".into(),
            expected_amount: "0.00003".into(),
            condition: Condition::new(3, Operator::Lt, U256::from(1500)),
            expiration_hours: 6,
            maker: Address::repeat_byte(0xab),
            receiver: None,
            allow_partial_fills: true,
            allow_multiple_fills: true,
        }
    }

    fn seed() -> OrderSeed {
        OrderSeed {
            nonce: 77,
            salt_entropy: U256::from(991),
            now_secs: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn builds_order_with_predicate_extension() {
        let built = builder().build_with_seed(&draft(), seed()).await.unwrap();
        let order = &built.order;

        assert_eq!(order.making_amount, U256::from(100_000u64));
        assert_eq!(order.expiration(), 1_700_000_000 + 6 * 3_600);
        assert_eq!(order.nonce(), 77);
        assert!(order.maker_traits.has_extension());
        assert!(order.maker_traits.allows_multiple_fills());
        assert!(order.check_consistency().is_ok());

        let decoded = order.predicate().unwrap();
        assert_eq!(decoded.index_id, 3);
        assert_eq!(decoded.oracle, Address::repeat_byte(0x0c));
        assert_eq!(built.typed_data["message"]["salt"], order.salt.to_string());
    }

    #[tokio::test]
    async fn identical_inputs_hash_identically() {
        let b = builder();
        let first = b.build_with_seed(&draft(), seed()).await.unwrap();
        let second = b.build_with_seed(&draft(), seed()).await.unwrap();
        assert_eq!(first.order_hash, second.order_hash);
        assert_eq!(first.order, second.order);
    }

    #[tokio::test]
    async fn changing_any_field_changes_hash() {
        let b = builder();
        let base = b.build_with_seed(&draft(), seed()).await.unwrap().order_hash;

        let mut amount = draft();
        amount.amount = "0.2".into();
        let mut asset = draft();
        asset.to_token = "DAI".into();
        let mut expiry = draft();
        expiry.expiration_hours = 7;

        for variant in [amount, asset, expiry] {
            let hash = b.build_with_seed(&variant, seed()).await.unwrap().order_hash;
            assert_ne!(hash, base);
        }

        let renonced = OrderSeed { nonce: 78, ..seed() };
        let hash = b.build_with_seed(&draft(), renonced).await.unwrap().order_hash;
        assert_ne!(hash, base);
    }

    #[tokio::test]
    async fn random_seeds_give_distinct_orders() {
        let b = builder();
        let first = b.build(&draft()).await.unwrap();
        let second = b.build(&draft()).await.unwrap();
        assert_ne!(first.order_hash, second.order_hash);
        assert!(first.order.nonce() <= MAX_NONCE);
    }

    #[tokio::test]
    async fn rejects_unknown_asset_and_bad_amount() {
        let b = builder();
        let mut unknown = draft();
        unknown.from_token = "SHIB".into();
        assert!(matches!(
            b.build_with_seed(&unknown, seed()).await,
            Err(OrderError::UnknownAsset(_))
        ));

        let mut negative = draft();
        negative.amount = "-5".into();
        assert!(matches!(
            b.build_with_seed(&negative, seed()).await,
            Err(OrderError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn unknown_index_propagates() {
        let mut missing = draft();
        missing.condition.index_id = 404;
        let err = builder().build_with_seed(&missing, seed()).await.unwrap_err();
        assert!(matches!(err, OrderError::Oracle(OracleError::UnknownIndex(404))));
    }

    #[test]
    fn resolve_rejects_zero_and_excessive_expiry() {
        let b = builder();
        for hours in [0, MAX_EXPIRATION_HOURS + 1] {
            let mut d = draft();
            d.expiration_hours = hours;
            assert!(matches!(b.resolve(&d), Err(OrderError::Validation(_))));
        }
    }
}
