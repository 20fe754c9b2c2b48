//! Push-feed backends for `FEED` indices.
//!
//! A feed is addressed by contract address and answers with its latest round.
//! The registry never caches feed answers: every read goes to the source.

use crate::error::OracleError;
use crate::index::IndexValue;
use crate::rpc::JsonRpcClient;
use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use std::collections::HashMap;

/// `latestRoundData()` selector.
pub const LATEST_ROUND_DATA_SELECTOR: [u8; 4] = [0xfe, 0xaf, 0x96, 0x8c];

/// Reads the latest answer published by a push feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Returns the feed's latest `(answer, updatedAt)`.
    async fn latest(&self, feed: Address) -> Result<IndexValue, OracleError>;
}

// =============================================================================
// In-memory feed
// =============================================================================

/// Feed answers held in process. Used by the local backend and by tests.
#[derive(Debug, Default)]
pub struct InMemoryFeed {
    answers: RwLock<HashMap<Address, Result<IndexValue, String>>>,
}

impl InMemoryFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a new answer for `feed`.
    pub fn publish(&self, feed: Address, value: U256, timestamp: u64) {
        self.answers
            .write()
            .insert(feed, Ok(IndexValue { value, timestamp }));
    }

    /// Makes every subsequent read of `feed` fail with `reason`.
    pub fn fail(&self, feed: Address, reason: impl Into<String>) {
        self.answers.write().insert(feed, Err(reason.into()));
    }
}

#[async_trait]
impl FeedSource for InMemoryFeed {
    async fn latest(&self, feed: Address) -> Result<IndexValue, OracleError> {
        match self.answers.read().get(&feed) {
            Some(Ok(answer)) => Ok(*answer),
            Some(Err(reason)) => Err(OracleError::Rpc(reason.clone())),
            None => Err(OracleError::Rpc(format!("no answer published by feed {feed:?}"))),
        }
    }
}

// =============================================================================
// RPC feed
// =============================================================================

/// Reads aggregator-style feeds through `eth_call`.
#[derive(Debug, Clone)]
pub struct RpcFeed {
    rpc: JsonRpcClient,
}

impl RpcFeed {
    #[must_use]
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl FeedSource for RpcFeed {
    async fn latest(&self, feed: Address) -> Result<IndexValue, OracleError> {
        let raw = self.rpc.eth_call(feed, &LATEST_ROUND_DATA_SELECTOR).await?;
        decode_latest_round(&raw)
    }
}

/// Decodes `(uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)`.
///
/// # Errors
///
/// Returns `OracleError::Decode` on malformed data or a negative answer.
pub fn decode_latest_round(data: &[u8]) -> Result<IndexValue, OracleError> {
    let tokens = abi::decode(
        &[
            ParamType::Uint(80),
            ParamType::Int(256),
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(80),
        ],
        data,
    )
    .map_err(|e| OracleError::Decode(format!("latestRoundData: {e}")))?;

    let (answer, updated_at) = match (&tokens[1], &tokens[3]) {
        (Token::Int(answer), Token::Uint(updated_at)) => (*answer, *updated_at),
        _ => return Err(OracleError::Decode("latestRoundData: unexpected token types".into())),
    };

    // int256 arrives as two's complement.
    if answer.bit(255) {
        return Err(OracleError::Decode("feed answer is negative".into()));
    }
    if updated_at > U256::from(u64::MAX) {
        return Err(OracleError::Decode("feed timestamp overflows u64".into()));
    }

    Ok(IndexValue {
        value: answer,
        timestamp: updated_at.as_u64(),
    })
}
