//! Order extension encoding.
//!
//! Layout: a 32-byte big-endian offsets word followed by the concatenated
//! fields, then custom data. Field `i`'s cumulative end offset occupies bits
//! `[32*i, 32*i + 32)` of the offsets word.

use crate::error::OrderError;
use ethers::types::{Bytes, H256, U256};
use ethers::utils::keccak256;

const FIELD_COUNT: usize = 8;
const LOW_160_BITS: usize = 160;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extension {
    pub maker_asset_suffix: Bytes,
    pub taker_asset_suffix: Bytes,
    pub making_amount_data: Bytes,
    pub taking_amount_data: Bytes,
    pub predicate: Bytes,
    pub maker_permit: Bytes,
    pub pre_interaction: Bytes,
    pub post_interaction: Bytes,
    pub custom_data: Bytes,
}

impl Extension {
    /// Extension carrying only a predicate.
    #[must_use]
    pub fn with_predicate(predicate: Bytes) -> Self {
        Self {
            predicate,
            ..Self::default()
        }
    }

    fn fields(&self) -> [&Bytes; FIELD_COUNT] {
        [
            &self.maker_asset_suffix,
            &self.taker_asset_suffix,
            &self.making_amount_data,
            &self.taking_amount_data,
            &self.predicate,
            &self.maker_permit,
            &self.pre_interaction,
            &self.post_interaction,
        ]
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_empty()) && self.custom_data.is_empty()
    }

    /// Encodes to wire bytes. An empty extension encodes to no bytes at all.
    ///
    /// # Errors
    ///
    /// Returns `PredicateEncoding` if the fields exceed the 32-bit offset range.
    pub fn encode(&self) -> Result<Bytes, OrderError> {
        if self.is_empty() {
            return Ok(Bytes::new());
        }

        let mut offsets = U256::zero();
        let mut body = Vec::new();
        for (i, field) in self.fields().iter().enumerate() {
            body.extend_from_slice(field);
            let end = u32::try_from(body.len()).map_err(|_| {
                OrderError::PredicateEncoding("extension exceeds 4 GiB".into())
            })?;
            offsets = offsets | (U256::from(end) << (32 * i));
        }

        let mut out = vec![0u8; 32];
        offsets.to_big_endian(&mut out);
        out.extend(body);
        out.extend_from_slice(&self.custom_data);
        Ok(Bytes::from(out))
    }

    /// Parses wire bytes produced by [`Extension::encode`].
    ///
    /// # Errors
    ///
    /// Returns `Validation` for truncated or non-monotonic offsets.
    pub fn decode(data: &[u8]) -> Result<Self, OrderError> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        if data.len() < 32 {
            return Err(OrderError::Validation("extension shorter than its header".into()));
        }

        let offsets = U256::from_big_endian(&data[..32]);
        let body = &data[32..];
        let mut fields: Vec<Bytes> = Vec::with_capacity(FIELD_COUNT);
        let mut start = 0usize;
        for i in 0..FIELD_COUNT {
            let end = ((offsets >> (32 * i)) & U256::from(u32::MAX)).as_usize();
            if end < start || end > body.len() {
                return Err(OrderError::Validation(format!(
                    "extension field {i} has invalid offset {end}"
                )));
            }
            fields.push(Bytes::from(body[start..end].to_vec()));
            start = end;
        }
        let custom_data = Bytes::from(body[start..].to_vec());

        let mut it = fields.into_iter();
        let mut next = || it.next().unwrap_or_default();
        Ok(Self {
            maker_asset_suffix: next(),
            taker_asset_suffix: next(),
            making_amount_data: next(),
            taking_amount_data: next(),
            predicate: next(),
            maker_permit: next(),
            pre_interaction: next(),
            post_interaction: next(),
            custom_data,
        })
    }
}

/// Predicate bytes of an encoded extension, empty if absent.
///
/// # Errors
///
/// Propagates decoding errors.
pub fn predicate_of(extension: &[u8]) -> Result<Bytes, OrderError> {
    Extension::decode(extension).map(|e| e.predicate)
}

/// Low 160 bits of `keccak256(extension)`, which the protocol checks against the salt.
#[must_use]
pub fn extension_hash_bits(extension: &[u8]) -> U256 {
    let hash = H256::from(keccak256(extension));
    U256::from_big_endian(hash.as_bytes()) & ((U256::one() << LOW_160_BITS) - 1)
}

/// Builds a salt whose low 160 bits bind the extension and whose upper 96 bits are `entropy`.
#[must_use]
pub fn salt_for(extension: &[u8], entropy: U256) -> U256 {
    let high_mask = (U256::one() << 96) - 1;
    ((entropy & high_mask) << LOW_160_BITS) | extension_hash_bits(extension)
}

/// True when `salt` carries the extension binding. Orders without an extension are unconstrained.
#[must_use]
pub fn salt_matches(salt: U256, extension: &[u8]) -> bool {
    extension.is_empty()
        || (salt & ((U256::one() << LOW_160_BITS) - 1)) == extension_hash_bits(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extension_encodes_to_nothing() {
        assert!(Extension::default().encode().unwrap().is_empty());
        assert_eq!(Extension::decode(&[]).unwrap(), Extension::default());
    }

    #[test]
    fn predicate_offsets_cover_fields_four_through_seven() {
        let predicate = Bytes::from(vec![0xab; 10]);
        let encoded = Extension::with_predicate(predicate.clone()).encode().unwrap();
        assert_eq!(encoded.len(), 32 + 10);

        let offsets = U256::from_big_endian(&encoded[..32]);
        for i in 0..4 {
            assert_eq!((offsets >> (32 * i)) & U256::from(u32::MAX), U256::zero());
        }
        for i in 4..8 {
            assert_eq!((offsets >> (32 * i)) & U256::from(u32::MAX), U256::from(10));
        }
        assert_eq!(predicate_of(&encoded).unwrap(), predicate);
    }

    #[test]
    fn decode_inverts_encode_with_custom_data() {
        let ext = Extension {
            maker_permit: Bytes::from(vec![1, 2, 3]),
            predicate: Bytes::from(vec![9; 40]),
            custom_data: Bytes::from(vec![7, 7]),
            ..Extension::default()
        };
        let decoded = Extension::decode(&ext.encode().unwrap()).unwrap();
        assert_eq!(decoded, ext);
    }

    #[test]
    fn decode_rejects_truncated_header() {
        assert!(Extension::decode(&[0u8; 12]).is_err());
    }

    #[test]
    fn decode_rejects_offsets_past_end() {
        let mut data = vec![0u8; 32];
        data[31] = 50;
        data.extend_from_slice(&[0u8; 4]);
        assert!(Extension::decode(&data).is_err());
    }

    #[test]
    fn salt_binds_extension_hash() {
        let ext = Extension::with_predicate(Bytes::from(vec![0x42; 64]))
            .encode()
            .unwrap();
        let salt = salt_for(&ext, U256::from(123_456u64));
        assert!(salt_matches(salt, &ext));
        assert_eq!(salt >> 160, U256::from(123_456u64));
        assert!(!salt_matches(salt + 1, &ext));
        assert!(salt_matches(U256::from(5), &[]));
    }
}
