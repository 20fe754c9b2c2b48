//! ERC-20 approval calldata and allowance reads.
//!
//! The settlement protocol pulls the maker asset at fill time, so the maker
//! must have approved it. When the book reports an allowance failure the
//! caller gets a ready-to-sign `approve(protocol, MAX_UINT256)` transaction.

use condswap_oracle::{JsonRpcClient, OracleError};
use ethers::types::{Address, Bytes, U256};
use serde::Serialize;
use tracing::debug;

// =============================================================================
// ABI Encoding Helpers
// =============================================================================

/// ERC-20 `approve(address spender, uint256 amount)` selector.
const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// ERC-20 `allowance(address owner, address spender)` selector.
const ALLOWANCE_SELECTOR: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];

/// MAX_UINT256 for unlimited approval.
const MAX_UINT256: [u8; 32] = [0xff; 32];

fn push_address(data: &mut Vec<u8>, address: Address) {
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(address.as_bytes());
}

/// Builds ERC-20 `approve(spender, MAX_UINT256)` calldata.
#[must_use]
pub fn build_erc20_approve(spender: Address) -> Bytes {
    let mut data = Vec::with_capacity(68);
    data.extend_from_slice(&APPROVE_SELECTOR);
    push_address(&mut data, spender);
    data.extend_from_slice(&MAX_UINT256);
    Bytes::from(data)
}

/// Builds ERC-20 `allowance(owner, spender)` calldata.
#[must_use]
pub fn build_erc20_allowance(owner: Address, spender: Address) -> Bytes {
    let mut data = Vec::with_capacity(68);
    data.extend_from_slice(&ALLOWANCE_SELECTOR);
    push_address(&mut data, owner);
    push_address(&mut data, spender);
    Bytes::from(data)
}

// =============================================================================
// Approval Hint
// =============================================================================

/// Unsigned approval transaction for the maker to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalHint {
    /// Token contract being approved.
    pub to: Address,
    pub data: Bytes,
    pub value: String,
    pub spender: Address,
    pub description: String,
}

impl ApprovalHint {
    #[must_use]
    pub fn unlimited(token: Address, token_symbol: &str, spender: Address) -> Self {
        Self {
            to: token,
            data: build_erc20_approve(spender),
            value: "0".to_string(),
            spender,
            description: format!("Approve {token_symbol} for the limit order protocol"),
        }
    }
}

/// Reads `token.allowance(owner, spender)`.
///
/// # Errors
///
/// Returns an error on RPC failure or a result shorter than one word.
pub async fn read_allowance(
    rpc: &JsonRpcClient,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, OracleError> {
    let raw = rpc
        .eth_call(token, &build_erc20_allowance(owner, spender))
        .await?;
    if raw.len() < 32 {
        return Err(OracleError::Decode(format!(
            "allowance result has {} bytes",
            raw.len()
        )));
    }
    let allowance = U256::from_big_endian(&raw[..32]);
    debug!(token = ?token, owner = ?owner, allowance = %allowance, "Read allowance");
    Ok(allowance)
}
