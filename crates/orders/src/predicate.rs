//! Condition → predicate bytes.
//!
//! ```text
//! protocol(20) ‖ cmp(uint256 threshold, bytes call)
//!   call = arbitraryStaticCall(address oracle, bytes getValue(indexId))
//! ```
//!
//! The settlement protocol evaluates the predicate at fill time, so it
//! references the oracle contract rather than a snapshotted value. Encoding
//! is pure: identical inputs always yield identical bytes.

use condswap_core::{Condition, Operator};
use condswap_oracle::get_value_calldata;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;
use serde::Serialize;

const ARBITRARY_STATIC_CALL: &str = "arbitraryStaticCall(address,bytes)";

/// On-chain comparison the protocol supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Gt,
    Lt,
    Eq,
}

impl Comparison {
    #[must_use]
    pub const fn signature(self) -> &'static str {
        match self {
            Comparison::Gt => "gt(uint256,bytes)",
            Comparison::Lt => "lt(uint256,bytes)",
            Comparison::Eq => "eq(uint256,bytes)",
        }
    }

    #[must_use]
    pub fn selector(self) -> [u8; 4] {
        id(self.signature())
    }

    fn from_selector(selector: &[u8]) -> Option<Self> {
        [Comparison::Gt, Comparison::Lt, Comparison::Eq]
            .into_iter()
            .find(|c| c.selector() == selector)
    }
}

impl From<Operator> for Comparison {
    /// Inclusive operators collapse to their strict counterparts and `Neq` to `Gt`.
    fn from(operator: Operator) -> Self {
        match operator {
            Operator::Gt | Operator::Gte | Operator::Neq => Comparison::Gt,
            Operator::Lt | Operator::Lte => Comparison::Lt,
            Operator::Eq => Comparison::Eq,
        }
    }
}

/// Encodes `condition` into predicate bytes for `protocol`, reading `oracle` at fill time.
#[must_use]
pub fn encode_predicate(condition: &Condition, protocol: Address, oracle: Address) -> Bytes {
    let static_call = with_selector(
        id(ARBITRARY_STATIC_CALL),
        &[
            Token::Address(oracle),
            Token::Bytes(get_value_calldata(condition.index_id)),
        ],
    );

    let comparison = Comparison::from(condition.operator);
    let compare_call = with_selector(
        comparison.selector(),
        &[Token::Uint(condition.threshold), Token::Bytes(static_call)],
    );

    let mut out = Vec::with_capacity(20 + compare_call.len());
    out.extend_from_slice(protocol.as_bytes());
    out.extend(compare_call);
    Bytes::from(out)
}

fn with_selector(selector: [u8; 4], args: &[Token]) -> Vec<u8> {
    let mut data = selector.to_vec();
    data.extend(abi::encode(args));
    data
}

/// Fields recovered from predicate bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedPredicate {
    pub protocol: Address,
    pub comparison: Comparison,
    #[serde(with = "condswap_core::units::u256_dec")]
    pub threshold: U256,
    pub oracle: Address,
    pub index_id: u64,
}

/// Inverse of [`encode_predicate`] for predicates this service produced.
///
/// Returns `None` for foreign or malformed predicates.
#[must_use]
pub fn decode_predicate(predicate: &[u8]) -> Option<DecodedPredicate> {
    if predicate.len() < 24 {
        return None;
    }
    let protocol = Address::from_slice(&predicate[..20]);
    let comparison = Comparison::from_selector(&predicate[20..24])?;

    let outer = abi::decode(&[ParamType::Uint(256), ParamType::Bytes], &predicate[24..]).ok()?;
    let (threshold, static_call) = match (outer.first()?, outer.get(1)?) {
        (Token::Uint(t), Token::Bytes(b)) => (*t, b.clone()),
        _ => return None,
    };

    if static_call.len() < 4 || static_call[..4] != id(ARBITRARY_STATIC_CALL) {
        return None;
    }
    let inner = abi::decode(&[ParamType::Address, ParamType::Bytes], &static_call[4..]).ok()?;
    let (oracle, get_value) = match (inner.first()?, inner.get(1)?) {
        (Token::Address(a), Token::Bytes(b)) => (*a, b.clone()),
        _ => return None,
    };

    if get_value.len() != 36 || get_value[..4] != get_value_calldata(0)[..4] {
        return None;
    }
    let index_id = U256::from_big_endian(&get_value[4..]);
    if index_id > U256::from(u64::MAX) {
        return None;
    }

    Some(DecodedPredicate {
        protocol,
        comparison,
        threshold,
        oracle,
        index_id: index_id.as_u64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn protocol() -> Address {
        "0x111111125421cA6dc452d289314280a0f8842A65".parse().unwrap()
    }

    fn oracle() -> Address {
        Address::repeat_byte(0x0c)
    }

    fn encode(index_id: u64, operator: Operator, threshold: u64) -> Bytes {
        encode_predicate(
            &Condition::new(index_id, operator, U256::from(threshold)),
            protocol(),
            oracle(),
        )
    }

    fn canonical(op: Operator) -> Operator {
        match Comparison::from(op) {
            Comparison::Gt => Operator::Gt,
            Comparison::Lt => Operator::Lt,
            Comparison::Eq => Operator::Eq,
        }
    }

    proptest! {
        #[test]
        fn encoding_is_pure_and_collapses_operators(
            op in prop::sample::select(Operator::ALL.to_vec()),
            index_id in any::<u64>(),
            threshold in any::<[u8; 32]>().prop_map(|b| U256::from_big_endian(&b)),
        ) {
            let condition = Condition::new(index_id, op, threshold);
            let bytes = encode_predicate(&condition, protocol(), oracle());
            prop_assert_eq!(&bytes, &encode_predicate(&condition, protocol(), oracle()));

            let strict = Condition::new(index_id, canonical(op), threshold);
            prop_assert_eq!(&bytes, &encode_predicate(&strict, protocol(), oracle()));

            let decoded = decode_predicate(&bytes).unwrap();
            prop_assert_eq!(decoded.comparison, Comparison::from(op));
            prop_assert_eq!(decoded.threshold, threshold);
            prop_assert_eq!(decoded.index_id, index_id);
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        for op in Operator::ALL {
            assert_eq!(encode(3, op, 1500), encode(3, op, 1500));
        }
    }

    #[test]
    fn inclusive_operators_collapse_to_strict() {
        for (index_id, threshold) in [(0, 0), (3, 1500), (5, u64::MAX)] {
            assert_eq!(
                encode(index_id, Operator::Gt, threshold),
                encode(index_id, Operator::Gte, threshold)
            );
            assert_eq!(
                encode(index_id, Operator::Lt, threshold),
                encode(index_id, Operator::Lte, threshold)
            );
            assert_eq!(
                encode(index_id, Operator::Neq, threshold),
                encode(index_id, Operator::Gt, threshold)
            );
        }
    }

    #[test]
    fn distinct_comparisons_produce_distinct_bytes() {
        assert_ne!(encode(3, Operator::Gt, 1500), encode(3, Operator::Lt, 1500));
        assert_ne!(encode(3, Operator::Lt, 1500), encode(3, Operator::Eq, 1500));
        assert_ne!(encode(3, Operator::Lt, 1500), encode(3, Operator::Lt, 1501));
        assert_ne!(encode(3, Operator::Lt, 1500), encode(4, Operator::Lt, 1500));
    }

    #[test]
    fn starts_with_protocol_then_comparison_selector() {
        let bytes = encode(3, Operator::Lt, 1500);
        assert_eq!(&bytes[..20], protocol().as_bytes());
        assert_eq!(&bytes[20..24], &id("lt(uint256,bytes)"));
    }

    #[test]
    fn decode_recovers_condition_fields() {
        let bytes = encode(3, Operator::Lte, 1500);
        let decoded = decode_predicate(&bytes).unwrap();
        assert_eq!(decoded.protocol, protocol());
        assert_eq!(decoded.oracle, oracle());
        assert_eq!(decoded.comparison, Comparison::Lt);
        assert_eq!(decoded.threshold, U256::from(1500));
        assert_eq!(decoded.index_id, 3);
    }

    #[test]
    fn decode_rejects_foreign_bytes() {
        assert!(decode_predicate(&[]).is_none());
        assert!(decode_predicate(&[0u8; 100]).is_none());
    }
}
