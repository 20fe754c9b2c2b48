//! Reads the deployed index oracle contract over JSON-RPC.

use crate::error::OracleError;
use crate::index::{Index, IndexValue, OracleType, PredefinedIndex, PREDEFINED_INDEX_COUNT};
use crate::rpc::JsonRpcClient;
use crate::OracleReader;
use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on ids checked by `list_indices`.
const MAX_LISTED_INDICES: u64 = 256;

// =============================================================================
// Calldata
// =============================================================================

fn selector(signature: &str) -> [u8; 4] {
    ethers::utils::id(signature)
}

fn calldata(signature: &str, index_id: u64) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(abi::encode(&[Token::Uint(U256::from(index_id))]));
    data
}

/// Calldata for `getValue(uint256)`. Embedded in predicates, so it must be byte-stable.
#[must_use]
pub fn get_value_calldata(index_id: u64) -> Vec<u8> {
    calldata("getValue(uint256)", index_id)
}

// =============================================================================
// RpcOracle
// =============================================================================

/// `OracleReader` backed by `eth_call` against the oracle contract.
#[derive(Debug, Clone)]
pub struct RpcOracle {
    rpc: JsonRpcClient,
    contract: Address,
    read_timeout: Duration,
}

impl RpcOracle {
    #[must_use]
    pub fn new(rpc: JsonRpcClient, contract: Address, read_timeout: Duration) -> Self {
        Self {
            rpc,
            contract,
            read_timeout,
        }
    }

    async fn call(&self, data: Vec<u8>) -> Result<Bytes, OracleError> {
        tokio::time::timeout(self.read_timeout, self.rpc.eth_call(self.contract, &data))
            .await
            .map_err(|_| OracleError::Timeout(self.read_timeout))?
    }

    async fn call_decode(
        &self,
        signature: &str,
        index_id: u64,
        outputs: &[ParamType],
    ) -> Result<Vec<Token>, OracleError> {
        let raw = self.call(calldata(signature, index_id)).await?;
        abi::decode(outputs, &raw).map_err(|e| OracleError::Decode(format!("{signature}: {e}")))
    }
}

#[async_trait]
impl OracleReader for RpcOracle {
    fn contract_address(&self) -> Address {
        self.contract
    }

    async fn get_value(&self, index_id: u64) -> Result<IndexValue, OracleError> {
        let tokens = match self
            .call_decode(
                "getValue(uint256)",
                index_id,
                &[ParamType::Uint(256), ParamType::Uint(256)],
            )
            .await
        {
            Ok(tokens) => tokens,
            Err(OracleError::Rpc(msg)) if msg.contains("revert") => {
                // The contract reverts for unknown ids and for failing feeds alike.
                if self.is_valid_index(index_id).await? {
                    return Err(OracleError::Unavailable { index_id, reason: msg });
                }
                return Err(OracleError::UnknownIndex(index_id));
            }
            Err(e) => return Err(e),
        };

        match (tokens.first(), tokens.get(1)) {
            (Some(Token::Uint(value)), Some(Token::Uint(timestamp))) => {
                if *timestamp > U256::from(u64::MAX) {
                    return Err(OracleError::Decode("timestamp overflows u64".into()));
                }
                Ok(IndexValue {
                    value: *value,
                    timestamp: timestamp.as_u64(),
                })
            }
            _ => Err(OracleError::Decode("getValue: unexpected tokens".into())),
        }
    }

    async fn get_index(&self, index_id: u64) -> Result<Index, OracleError> {
        if !self.is_valid_index(index_id).await? {
            return Err(OracleError::UnknownIndex(index_id));
        }
        let (value, timestamp, unavailable) = match self.get_value(index_id).await {
            Ok(reading) => (reading.value, reading.timestamp, None),
            Err(e @ (OracleError::Unavailable { .. } | OracleError::Timeout(_))) => {
                warn!(index_id, error = %e, "Index value unavailable");
                (U256::zero(), 0, Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };
        let oracle_type = self.get_oracle_type(index_id).await?;
        let feed = self.get_oracle_address(index_id).await?;

        Ok(Index {
            id: index_id,
            value,
            timestamp,
            source_url: PredefinedIndex::from_id(index_id)
                .map(|p| p.source_url().to_string())
                .unwrap_or_default(),
            is_active: true,
            oracle_type,
            feed_address: (!feed.is_zero()).then_some(feed),
            unavailable,
        })
    }

    async fn is_valid_index(&self, index_id: u64) -> Result<bool, OracleError> {
        let tokens = self
            .call_decode("isValidIndex(uint256)", index_id, &[ParamType::Bool])
            .await?;
        match tokens.first() {
            Some(Token::Bool(valid)) => Ok(*valid),
            _ => Err(OracleError::Decode("isValidIndex: unexpected tokens".into())),
        }
    }

    async fn get_oracle_type(&self, index_id: u64) -> Result<OracleType, OracleError> {
        let tokens = self
            .call_decode("getOracleType(uint256)", index_id, &[ParamType::Uint(8)])
            .await?;
        match tokens.first() {
            Some(Token::Uint(raw)) if *raw <= U256::from(u8::MAX) => {
                OracleType::from_u8(raw.as_u32() as u8)
                    .ok_or_else(|| OracleError::Decode(format!("unknown oracle type {raw}")))
            }
            _ => Err(OracleError::Decode("getOracleType: unexpected tokens".into())),
        }
    }

    async fn get_oracle_address(&self, index_id: u64) -> Result<Address, OracleError> {
        let tokens = self
            .call_decode("getOracleAddress(uint256)", index_id, &[ParamType::Address])
            .await?;
        match tokens.first() {
            Some(Token::Address(addr)) => Ok(*addr),
            _ => Err(OracleError::Decode("getOracleAddress: unexpected tokens".into())),
        }
    }

    async fn list_indices(&self) -> Result<Vec<Index>, OracleError> {
        let mut indices = Vec::new();
        for index_id in 0..MAX_LISTED_INDICES {
            match self.get_index(index_id).await {
                Ok(index) => indices.push(index),
                // Deactivated predefined ids leave gaps; custom ids are dense.
                Err(OracleError::UnknownIndex(_)) if index_id < PREDEFINED_INDEX_COUNT => {}
                Err(OracleError::UnknownIndex(_)) => break,
                Err(e) => {
                    warn!(index_id, error = %e, "Index listing stopped early");
                    return Err(e);
                }
            }
        }
        debug!(count = indices.len(), "Listed indices from contract");
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hex_word(tokens: &[Token]) -> String {
        format!("0x{}", hex::encode(abi::encode(tokens)))
    }

    fn selector_hex(signature: &str) -> String {
        hex::encode(selector(signature))
    }

    /// `outcome` is merged into the JSON-RPC envelope, e.g. `{"result": ...}` or `{"error": ...}`.
    async fn mount_call(server: &MockServer, signature: &str, outcome: serde_json::Value) {
        mount_matching(server, selector_hex(signature), outcome, 5).await;
    }

    /// Like `mount_call`, but only for calls about `index_id`; wins over `mount_call`.
    async fn mount_call_for(
        server: &MockServer,
        signature: &str,
        index_id: u64,
        outcome: serde_json::Value,
    ) {
        mount_matching(server, hex::encode(calldata(signature, index_id)), outcome, 1).await;
    }

    async fn mount_matching(server: &MockServer, needle: String, outcome: serde_json::Value, priority: u8) {
        let mut body = serde_json::json!({"jsonrpc": "2.0", "id": 1});
        body.as_object_mut()
            .unwrap()
            .extend(outcome.as_object().unwrap().clone());

        Mock::given(method("POST"))
            .and(body_string_contains(needle))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .with_priority(priority)
            .mount(server)
            .await;
    }

    fn oracle(server: &MockServer, timeout: Duration) -> RpcOracle {
        let rpc = JsonRpcClient::new(server.uri(), Duration::from_secs(2)).unwrap();
        RpcOracle::new(rpc, Address::repeat_byte(0x0c), timeout)
    }

    #[test]
    fn get_value_calldata_is_selector_plus_word() {
        let data = get_value_calldata(3);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &selector("getValue(uint256)"));
        assert_eq!(data[35], 3);
    }

    #[tokio::test]
    async fn reads_value_and_timestamp() {
        let server = MockServer::start().await;
        mount_call(
            &server,
            "getValue(uint256)",
            serde_json::json!({"result": hex_word(&[Token::Uint(U256::from(1_850)), Token::Uint(U256::from(1_700_000_000u64))])}),
        )
        .await;

        let value = oracle(&server, Duration::from_secs(1)).get_value(3).await.unwrap();
        assert_eq!(value.value, U256::from(1_850));
        assert_eq!(value.timestamp, 1_700_000_000);
    }

    #[tokio::test]
    async fn revert_on_invalid_index_maps_to_unknown_index() {
        let server = MockServer::start().await;
        mount_call(
            &server,
            "getValue(uint256)",
            serde_json::json!({"error": {"code": 3, "message": "execution reverted: invalid index"}}),
        )
        .await;
        mount_call(
            &server,
            "isValidIndex(uint256)",
            serde_json::json!({"result": hex_word(&[Token::Bool(false)])}),
        )
        .await;

        let err = oracle(&server, Duration::from_secs(1)).get_value(42).await.unwrap_err();
        assert!(matches!(err, OracleError::UnknownIndex(42)), "{err:?}");
    }

    #[tokio::test]
    async fn reads_oracle_type_and_address() {
        let server = MockServer::start().await;
        let feed = Address::repeat_byte(0xfe);
        mount_call(
            &server,
            "getOracleType(uint256)",
            serde_json::json!({"result": hex_word(&[Token::Uint(U256::one())])}),
        )
        .await;
        mount_call(
            &server,
            "getOracleAddress(uint256)",
            serde_json::json!({"result": hex_word(&[Token::Address(feed)])}),
        )
        .await;

        let oracle = oracle(&server, Duration::from_secs(1));
        assert_eq!(oracle.get_oracle_type(2).await.unwrap(), OracleType::Feed);
        assert_eq!(oracle.get_oracle_address(2).await.unwrap(), feed);
    }

    #[tokio::test]
    async fn read_is_bounded_by_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(800))
                    .set_body_json(serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": "0x"})),
            )
            .mount(&server)
            .await;

        let err = oracle(&server, Duration::from_millis(50))
            .is_valid_index(0)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Timeout(_)));
    }

    #[tokio::test]
    async fn listing_degrades_an_index_whose_feed_reverts() {
        let server = MockServer::start().await;
        let valid = serde_json::json!({"result": hex_word(&[Token::Bool(true)])});
        for index_id in 0..3 {
            mount_call_for(&server, "isValidIndex(uint256)", index_id, valid.clone()).await;
        }
        mount_call(
            &server,
            "isValidIndex(uint256)",
            serde_json::json!({"result": hex_word(&[Token::Bool(false)])}),
        )
        .await;
        for index_id in [0, 2] {
            mount_call_for(
                &server,
                "getValue(uint256)",
                index_id,
                serde_json::json!({"result": hex_word(&[Token::Uint(U256::from(500 + index_id)), Token::Uint(U256::from(1_700_000_000u64))])}),
            )
            .await;
        }
        mount_call_for(
            &server,
            "getValue(uint256)",
            1,
            serde_json::json!({"error": {"code": 3, "message": "execution reverted: stale feed"}}),
        )
        .await;
        mount_call(
            &server,
            "getOracleType(uint256)",
            serde_json::json!({"result": hex_word(&[Token::Uint(U256::one())])}),
        )
        .await;
        mount_call(
            &server,
            "getOracleAddress(uint256)",
            serde_json::json!({"result": hex_word(&[Token::Address(Address::zero())])}),
        )
        .await;

        let oracle = oracle(&server, Duration::from_secs(1));
        let listed = oracle.list_indices().await.unwrap();
        assert_eq!(listed.iter().map(|i| i.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(listed[0].value, U256::from(500));
        assert_eq!(listed[2].value, U256::from(502));
        assert!(listed[0].has_live_value() && listed[2].has_live_value());
        assert!(listed[1].unavailable.as_deref().unwrap().contains("stale feed"));

        let single = oracle.get_index(1).await.unwrap();
        assert_eq!(single.oracle_type, OracleType::Feed);
        assert!(!single.has_live_value());
    }
}
