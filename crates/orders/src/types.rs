//! Request and response bodies of the pipeline.
//!
//! Field names are camelCase on the wire; uint256 values travel as decimal strings.

use crate::approvals::ApprovalHint;
use crate::cancel::{CancelCheck, CancelTransaction};
use crate::monitor::MonitorReport;
use crate::order::LimitOrder;
use crate::order_book::SubmissionReceipt;
use crate::predicate::{Comparison, DecodedPredicate};
use condswap_core::units::u256_dec;
use condswap_core::{Condition, ErrorCode, HasErrorCode, OrderState};
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accepts `"0.1"` or `0.1` for human amounts.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

// =============================================================================
// Errors
// =============================================================================

/// `{code, message}` carried by every failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn from_error<E: HasErrorCode + std::fmt::Display>(err: &E) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Prepare
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionInput {
    pub index_id: u64,
    /// `gt`, `lt`, `gte`, `lte`, `eq`, `neq` or their symbols.
    pub operator: String,
    #[serde(with = "u256_dec")]
    pub threshold: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    pub from_token: String,
    pub to_token: String,
    #[serde(deserialize_with = "string_or_number")]
    pub amount: String,
    #[serde(deserialize_with = "string_or_number")]
    pub expected_amount: String,
    pub condition: ConditionInput,
    pub expiration_hours: u64,
    pub maker_address: String,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub allow_partial_fills: Option<bool>,
    #[serde(default)]
    pub allow_multiple_fills: Option<bool>,
}

/// Condition as echoed back, with the index's current reading when available.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionView {
    #[serde(flatten)]
    pub condition: Condition,
    pub index_name: Option<String>,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub current_value: Option<U256>,
    pub currently_met: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningData {
    pub typed_data: Value,
    pub order_hash: H256,
    pub order_id: String,
}

/// Encoding details for clients that want to verify the order themselves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalDetails {
    pub predicate: Bytes,
    /// Comparison the predicate performs on-chain; inclusive operators encode strictly.
    pub encoded_comparison: Comparison,
    pub extension: Bytes,
    pub maker_traits_hex: String,
    pub nonce: u64,
    pub expiration: u64,
    pub chain_id: u64,
    pub protocol_address: Address,
    pub oracle_address: Address,
    pub maker_token: String,
    pub taker_token: String,
    pub making_amount_display: String,
    pub taking_amount_display: String,
    /// Current maker allowance for the protocol, `None` if it could not be read.
    #[serde(serialize_with = "serialize_opt_u256")]
    pub allowance: Option<U256>,
    /// Present when the known allowance is below the making amount.
    pub approval: Option<ApprovalHint>,
    /// Unix seconds after which the prepared order can no longer be submitted.
    pub pending_expires_at: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResponse {
    pub success: bool,
    pub order_hash: H256,
    pub order_id: String,
    pub order: LimitOrder,
    pub condition: ConditionView,
    pub signing_data: SigningData,
    pub technical: TechnicalDetails,
}

// =============================================================================
// Submit
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDataRef {
    pub order_id: String,
    /// Hash the client signed. Checked against the stored order when present.
    #[serde(default)]
    pub order_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub order_data: OrderDataRef,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    /// True once the order book accepted the order.
    pub submitted: bool,
    pub result: Option<SubmissionReceipt>,
    pub error: Option<ErrorBody>,
    /// Approval transaction to send before resubmitting, on allowance failures.
    pub approval: Option<ApprovalHint>,
}

/// The signed artifact, returned even when submission failed so it can be resubmitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedOrder {
    pub order: LimitOrder,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub order_hash: H256,
    pub order_id: String,
    pub submission: SubmissionView,
    pub signed_order: SignedOrder,
}

// =============================================================================
// Validate
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedOrder {
    pub maker_asset: Address,
    pub taker_asset: Address,
    #[serde(with = "u256_dec")]
    pub making_amount: U256,
    #[serde(with = "u256_dec")]
    pub taking_amount: U256,
    pub condition: Condition,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub error: Option<ErrorBody>,
    pub normalized: Option<NormalizedOrder>,
}

// =============================================================================
// Queries
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_hash: H256,
    pub state: OrderState,
    pub maker: Address,
    pub maker_asset: Address,
    pub taker_asset: Address,
    #[serde(with = "u256_dec")]
    pub making_amount: U256,
    #[serde(with = "u256_dec")]
    pub taking_amount: U256,
    pub remaining_maker_amount: Option<String>,
    pub expiration: u64,
    pub created_at: Option<String>,
    /// Condition decoded from the order's predicate.
    pub predicate: Option<DecodedPredicate>,
}

/// `?page=&limit=` on maker listings. Missing values use the book's defaults.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersResponse {
    pub maker: Address,
    pub count: usize,
    pub orders: Vec<OrderSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailsResponse {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub order: LimitOrder,
    pub signature: Option<String>,
    pub invalid_reason: Option<String>,
    /// Latest monitor report, if this service tracks the order.
    pub monitor: Option<MonitorReport>,
}

// =============================================================================
// Cancel
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub order_hash: String,
    pub maker_address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanCancelResponse {
    pub order_hash: H256,
    #[serde(flatten)]
    pub check: CancelCheck,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub success: bool,
    pub order_hash: H256,
    /// Unsigned transaction the maker must send.
    pub transaction: CancelTransaction,
}

fn serialize_opt_u256<S: serde::Serializer>(value: &Option<U256>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => u256_dec::serialize(v, s),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_request_accepts_numeric_amounts() {
        let req: PrepareRequest = serde_json::from_value(serde_json::json!({
            "fromToken": "USDC",
            "toToken": "WETH",
            "amount": 0.1,
            "expectedAmount": "0.00003",
            "condition": { "indexId": 3, "operator": "lt", "threshold": 1500 },
            "expirationHours": 6,
            "makerAddress": "0xabababababababababababababababababababab"
        }))
        .unwrap();
        assert_eq!(req.amount, "0.1");
        assert_eq!(req.condition.threshold, U256::from(1500));
        assert!(req.receiver.is_none());
    }

    #[test]
    fn submit_request_order_hash_is_optional() {
        let req: SubmitRequest = serde_json::from_value(serde_json::json!({
            "orderData": { "orderId": "abc" },
            "signature": "0x00"
        }))
        .unwrap();
        assert_eq!(req.order_data.order_id, "abc");
        assert!(req.order_data.order_hash.is_none());
    }

    #[test]
    fn error_body_serializes_code_string() {
        let body = ErrorBody {
            code: ErrorCode::OrderNotFound,
            message: "missing".into(),
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["code"], "ORDER_NOT_FOUND");
    }
}
