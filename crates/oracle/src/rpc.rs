//! Minimal EVM JSON-RPC access: `eth_call` and `eth_chainId`.

use crate::error::OracleError;
use ethers::types::{Address, Bytes};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Client
// =============================================================================

/// Thin JSON-RPC client bound to one endpoint. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: Client,
    rpc_url: String,
    timeout: Duration,
}

impl JsonRpcClient {
    /// Creates a client with an explicit per-request deadline.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
            timeout,
        })
    }

    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executes a read-only call against `to` at the latest block.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, an RPC error object, or a malformed result.
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Bytes, OracleError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [
                {
                    "to": format!("{to:?}"),
                    "data": format!("0x{}", hex::encode(data)),
                },
                "latest"
            ],
            "id": 1
        });

        let resp = self.send(&body).await?;
        let hex_str = parse_result_str(&resp)?;
        let raw = hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|e| OracleError::Decode(format!("eth_call result is not hex: {e}")))?;
        debug!(to = ?to, bytes = raw.len(), "eth_call ok");
        Ok(Bytes::from(raw))
    }

    /// Returns the chain id reported by the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed result.
    pub async fn chain_id(&self) -> Result<u64, OracleError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_chainId",
            "params": [],
            "id": 1
        });
        let resp = self.send(&body).await?;
        parse_hex_u64(&resp)
    }

    async fn send(&self, body: &serde_json::Value) -> Result<serde_json::Value, OracleError> {
        let resp = self
            .http
            .post(&self.rpc_url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.timeout)
                } else {
                    OracleError::Http(e)
                }
            })?;
        Ok(resp.json().await?)
    }
}

// =============================================================================
// Response parsing
// =============================================================================

fn parse_result_str(resp: &serde_json::Value) -> Result<&str, OracleError> {
    if let Some(error) = resp.get("error") {
        let msg = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown");
        return Err(OracleError::Rpc(msg.to_string()));
    }

    resp.get("result")
        .and_then(|r| r.as_str())
        .ok_or_else(|| OracleError::Rpc("No result in response".to_string()))
}

fn parse_hex_u64(resp: &serde_json::Value) -> Result<u64, OracleError> {
    let hex_str = parse_result_str(resp)?;
    u64::from_str_radix(hex_str.trim_start_matches("0x"), 16)
        .map_err(|e| OracleError::Decode(format!("Invalid hex: {e}")))
}
