//! EIP-712 typed data and hashing for v4 limit orders.
//!
//! The order hash returned to callers is the full signing hash
//! `keccak256(0x1901 ‖ domainSeparator ‖ structHash)`, which is what the
//! settlement protocol recomputes and what the maker signs.
//!
//! # References
//!
//! - [EIP-712](https://eips.ethereum.org/EIPS/eip-712)

use crate::order::LimitOrder;
use condswap_core::ProtocolConfig;
use ethers::abi::{self, Token};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use serde_json::{json, Value};

// =============================================================================
// Constants
// =============================================================================

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

const ORDER_TYPE: &str = "Order(uint256 salt,address maker,address receiver,address makerAsset,\
address takerAsset,uint256 makingAmount,uint256 takingAmount,uint256 makerTraits)";

// =============================================================================
// Domain
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    #[must_use]
    pub fn from_config(protocol: &ProtocolConfig, chain_id: u64) -> Self {
        Self {
            name: protocol.domain_name.clone(),
            version: protocol.domain_version.clone(),
            chain_id,
            verifying_contract: protocol.address,
        }
    }

    /// `hash(domainTypeHash ‖ hash(name) ‖ hash(version) ‖ chainId ‖ verifyingContract)`
    #[must_use]
    pub fn separator(&self) -> H256 {
        let encoded = abi::encode(&[
            Token::FixedBytes(keccak256(DOMAIN_TYPE).to_vec()),
            Token::FixedBytes(keccak256(self.name.as_bytes()).to_vec()),
            Token::FixedBytes(keccak256(self.version.as_bytes()).to_vec()),
            Token::Uint(U256::from(self.chain_id)),
            Token::Address(self.verifying_contract),
        ]);
        H256::from(keccak256(encoded))
    }
}

// =============================================================================
// Hashing
// =============================================================================

#[must_use]
pub fn order_type_hash() -> H256 {
    H256::from(keccak256(ORDER_TYPE))
}

/// `hash(ORDER_TYPEHASH ‖ abi_encode(fields))`. The extension is bound through the salt.
#[must_use]
pub fn order_struct_hash(order: &LimitOrder) -> H256 {
    let encoded = abi::encode(&[
        Token::FixedBytes(order_type_hash().as_bytes().to_vec()),
        Token::Uint(order.salt),
        Token::Address(order.maker),
        Token::Address(order.receiver),
        Token::Address(order.maker_asset),
        Token::Address(order.taker_asset),
        Token::Uint(order.making_amount),
        Token::Uint(order.taking_amount),
        Token::Uint(order.maker_traits.as_u256()),
    ]);
    H256::from(keccak256(encoded))
}

/// `keccak256("\x19\x01" ‖ domainSeparator ‖ structHash)`
#[must_use]
pub fn signing_hash(domain_separator: H256, struct_hash: H256) -> H256 {
    let mut data = Vec::with_capacity(2 + 32 + 32);
    data.push(0x19);
    data.push(0x01);
    data.extend_from_slice(domain_separator.as_bytes());
    data.extend_from_slice(struct_hash.as_bytes());
    H256::from(keccak256(data))
}

/// Canonical order hash under `domain`.
#[must_use]
pub fn order_hash(order: &LimitOrder, domain: &Eip712Domain) -> H256 {
    signing_hash(domain.separator(), order_struct_hash(order))
}

// =============================================================================
// Typed data
// =============================================================================

/// `eth_signTypedData_v4` payload for `order`. Integers are decimal strings.
#[must_use]
pub fn typed_data(order: &LimitOrder, domain: &Eip712Domain) -> Value {
    json!({
        "primaryType": "Order",
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            "Order": [
                { "name": "salt", "type": "uint256" },
                { "name": "maker", "type": "address" },
                { "name": "receiver", "type": "address" },
                { "name": "makerAsset", "type": "address" },
                { "name": "takerAsset", "type": "address" },
                { "name": "makingAmount", "type": "uint256" },
                { "name": "takingAmount", "type": "uint256" },
                { "name": "makerTraits", "type": "uint256" }
            ]
        },
        "domain": {
            "name": domain.name,
            "version": domain.version,
            "chainId": domain.chain_id,
            "verifyingContract": format!("{:?}", domain.verifying_contract)
        },
        "message": {
            "salt": order.salt.to_string(),
            "maker": format!("{:?}", order.maker),
            "receiver": format!("{:?}", order.receiver),
            "makerAsset": format!("{:?}", order.maker_asset),
            "takerAsset": format!("{:?}", order.taker_asset),
            "makingAmount": order.making_amount.to_string(),
            "takingAmount": order.taking_amount.to_string(),
            "makerTraits": order.maker_traits.as_u256().to_string()
        }
    })
}
