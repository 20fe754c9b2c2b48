//! Maker-only order cancellation.
//!
//! Cancelling is an on-chain `cancelOrder(makerTraits, orderHash)` call sent
//! by the maker. This service only checks eligibility and prepares calldata.

use crate::error::OrderError;
use crate::maker_traits::MakerTraits;
use crate::order_book::OrderBookEntry;
use condswap_core::OrderState;
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256};
use ethers::utils::id;
use serde::Serialize;

const CANCEL_ORDER_SIGNATURE: &str = "cancelOrder(uint256,bytes32)";

/// `cancelOrder(uint256 makerTraits, bytes32 orderHash)` calldata.
#[must_use]
pub fn cancel_calldata(maker_traits: MakerTraits, order_hash: H256) -> Bytes {
    let mut data = id(CANCEL_ORDER_SIGNATURE).to_vec();
    data.extend(abi::encode(&[
        Token::Uint(maker_traits.as_u256()),
        Token::FixedBytes(order_hash.as_bytes().to_vec()),
    ]));
    Bytes::from(data)
}

/// Unsigned cancellation transaction addressed to the settlement protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: String,
    pub chain_id: u64,
}

impl CancelTransaction {
    #[must_use]
    pub fn new(protocol: Address, chain_id: u64, maker_traits: MakerTraits, order_hash: H256) -> Self {
        Self {
            to: protocol,
            data: cancel_calldata(maker_traits, order_hash),
            value: "0".to_string(),
            chain_id,
        }
    }
}

/// Outcome of a can-cancel check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelCheck {
    pub can_cancel: bool,
    pub state: Option<OrderState>,
    pub reason: Option<String>,
}

impl CancelCheck {
    fn denied(state: Option<OrderState>, reason: impl Into<String>) -> Self {
        Self {
            can_cancel: false,
            state,
            reason: Some(reason.into()),
        }
    }
}

/// Only the maker may cancel.
///
/// # Errors
///
/// Returns `Unauthorized` naming the caller when it is not the maker.
pub fn authorize_cancel(entry: &OrderBookEntry, caller: Address) -> Result<(), OrderError> {
    if entry.data.maker == caller {
        Ok(())
    } else {
        Err(OrderError::Unauthorized(format!(
            "{caller:?} is not the maker of order {:?}",
            entry.order_hash
        )))
    }
}

/// Eligibility of `caller` to cancel the order the book returned (if any).
#[must_use]
pub fn check_cancel(entry: Option<&OrderBookEntry>, caller: Address, now_secs: u64) -> CancelCheck {
    let Some(entry) = entry else {
        return CancelCheck::denied(None, "order is not known to the order book");
    };
    let state = entry.observed_state(now_secs);
    if authorize_cancel(entry, caller).is_err() {
        return CancelCheck::denied(Some(state), "only the maker can cancel this order");
    }
    if state != OrderState::Active {
        return CancelCheck::denied(Some(state), format!("order is {state}"));
    }
    CancelCheck {
        can_cancel: true,
        state: Some(state),
        reason: None,
    }
}
