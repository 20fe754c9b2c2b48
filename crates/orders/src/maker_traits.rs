//! Limit-order-protocol v4 `makerTraits` bitfield.
//!
//! ```text
//! 255  no partial fills
//! 254  allow multiple fills
//! 249  has extension
//! 120..160  nonce or epoch (40 bits)
//! 80..120   expiration timestamp (40 bits)
//! 0..80     low 80 bits of the allowed sender
//! ```

use condswap_core::units::u256_dec;
use ethers::types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const NO_PARTIAL_FILLS_FLAG: usize = 255;
const ALLOW_MULTIPLE_FILLS_FLAG: usize = 254;
const HAS_EXTENSION_FLAG: usize = 249;

const EXPIRATION_OFFSET: usize = 80;
const NONCE_OFFSET: usize = 120;
const FORTY_BITS: u64 = (1 << 40) - 1;

/// Largest nonce that fits the 40-bit nonce field.
pub const MAX_NONCE: u64 = FORTY_BITS;

/// Largest expiration timestamp the field can hold.
pub const MAX_EXPIRATION: u64 = FORTY_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MakerTraits(U256);

impl MakerTraits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn as_u256(&self) -> U256 {
        self.0
    }

    fn with_flag(mut self, bit: usize, on: bool) -> Self {
        let mask = U256::one() << bit;
        if on {
            self.0 = self.0 | mask;
        } else {
            self.0 = self.0 & !mask;
        }
        self
    }

    fn with_field(mut self, offset: usize, value: u64) -> Self {
        let mask = U256::from(FORTY_BITS) << offset;
        self.0 = (self.0 & !mask) | ((U256::from(value & FORTY_BITS)) << offset);
        self
    }

    fn field(&self, offset: usize) -> u64 {
        ((self.0 >> offset) & U256::from(FORTY_BITS)).as_u64()
    }

    #[must_use]
    pub fn with_partial_fills(self, allowed: bool) -> Self {
        self.with_flag(NO_PARTIAL_FILLS_FLAG, !allowed)
    }

    #[must_use]
    pub fn with_multiple_fills(self, allowed: bool) -> Self {
        self.with_flag(ALLOW_MULTIPLE_FILLS_FLAG, allowed)
    }

    #[must_use]
    pub fn with_extension(self, has_extension: bool) -> Self {
        self.with_flag(HAS_EXTENSION_FLAG, has_extension)
    }

    /// Sets the expiration timestamp. Values are truncated to 40 bits.
    #[must_use]
    pub fn with_expiration(self, unix_secs: u64) -> Self {
        self.with_field(EXPIRATION_OFFSET, unix_secs)
    }

    /// Sets the nonce. Values are truncated to 40 bits.
    #[must_use]
    pub fn with_nonce(self, nonce: u64) -> Self {
        self.with_field(NONCE_OFFSET, nonce)
    }

    #[must_use]
    pub fn allows_partial_fills(&self) -> bool {
        !self.0.bit(NO_PARTIAL_FILLS_FLAG)
    }

    #[must_use]
    pub fn allows_multiple_fills(&self) -> bool {
        self.0.bit(ALLOW_MULTIPLE_FILLS_FLAG)
    }

    #[must_use]
    pub fn has_extension(&self) -> bool {
        self.0.bit(HAS_EXTENSION_FLAG)
    }

    /// Expiration timestamp, 0 when the order never expires.
    #[must_use]
    pub fn expiration(&self) -> u64 {
        self.field(EXPIRATION_OFFSET)
    }

    #[must_use]
    pub fn nonce(&self) -> u64 {
        self.field(NONCE_OFFSET)
    }

    #[must_use]
    pub fn is_expired(&self, now_secs: u64) -> bool {
        let expiration = self.expiration();
        expiration != 0 && expiration <= now_secs
    }

    /// `0x`-prefixed 32-byte hex, the form `cancelOrder` takes.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut buf = [0u8; 32];
        self.0.to_big_endian(&mut buf);
        format!("0x{}", hex::encode(buf))
    }
}

impl Serialize for MakerTraits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        u256_dec::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for MakerTraits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u256_dec::deserialize(deserializer).map(Self)
    }
}
