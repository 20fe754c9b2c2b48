//! Index records and the predefined index catalogue.

use condswap_core::units::u256_dec;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of reserved predefined ids (`0..PREDEFINED_INDEX_COUNT`).
pub const PREDEFINED_INDEX_COUNT: u64 = 6;

/// First id handed out to custom indices.
pub const FIRST_CUSTOM_INDEX_ID: u64 = PREDEFINED_INDEX_COUNT;

/// Which backend answers `getValue` for an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OracleType {
    /// Value set administratively.
    Static,
    /// Value read from a decentralized push feed.
    Feed,
}

impl OracleType {
    /// On-chain `uint8` representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            OracleType::Static => 0,
            OracleType::Feed => 1,
        }
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OracleType::Static),
            1 => Some(OracleType::Feed),
            _ => None,
        }
    }
}

impl fmt::Display for OracleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleType::Static => f.write_str("STATIC"),
            OracleType::Feed => f.write_str("FEED"),
        }
    }
}

/// Fixed-point scale of an index value. The encoder never converts between scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexScale {
    /// 100 = 1%.
    BasisPoints,
    /// USD * 100.
    UsdCents,
    /// Raw integer count.
    Count,
}

/// A resolved `(value, timestamp)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexValue {
    #[serde(with = "u256_dec")]
    pub value: U256,
    pub timestamp: u64,
}

/// Full index record as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub id: u64,
    #[serde(with = "u256_dec")]
    pub value: U256,
    pub timestamp: u64,
    pub source_url: String,
    pub is_active: bool,
    pub oracle_type: OracleType,
    pub feed_address: Option<Address>,
    /// Set when the live value could not be read; `value` and `timestamp` are then not current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
}

impl Index {
    #[must_use]
    pub fn has_live_value(&self) -> bool {
        self.unavailable.is_none()
    }

    #[must_use]
    pub fn is_predefined(&self) -> bool {
        self.id < PREDEFINED_INDEX_COUNT
    }
}

/// The indices every registry is seeded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedIndex {
    InflationRate,
    ElonFollowers,
    BtcPrice,
    VixIndex,
    UnemploymentRate,
    TeslaStock,
}

impl PredefinedIndex {
    pub const ALL: [PredefinedIndex; PREDEFINED_INDEX_COUNT as usize] = [
        PredefinedIndex::InflationRate,
        PredefinedIndex::ElonFollowers,
        PredefinedIndex::BtcPrice,
        PredefinedIndex::VixIndex,
        PredefinedIndex::UnemploymentRate,
        PredefinedIndex::TeslaStock,
    ];

    #[must_use]
    pub const fn id(self) -> u64 {
        match self {
            PredefinedIndex::InflationRate => 0,
            PredefinedIndex::ElonFollowers => 1,
            PredefinedIndex::BtcPrice => 2,
            PredefinedIndex::VixIndex => 3,
            PredefinedIndex::UnemploymentRate => 4,
            PredefinedIndex::TeslaStock => 5,
        }
    }

    #[must_use]
    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PredefinedIndex::InflationRate => "INFLATION_RATE",
            PredefinedIndex::ElonFollowers => "ELON_FOLLOWERS",
            PredefinedIndex::BtcPrice => "BTC_PRICE",
            PredefinedIndex::VixIndex => "VIX_INDEX",
            PredefinedIndex::UnemploymentRate => "UNEMPLOYMENT_RATE",
            PredefinedIndex::TeslaStock => "TESLA_STOCK",
        }
    }

    #[must_use]
    pub const fn scale(self) -> IndexScale {
        match self {
            PredefinedIndex::InflationRate
            | PredefinedIndex::VixIndex
            | PredefinedIndex::UnemploymentRate => IndexScale::BasisPoints,
            PredefinedIndex::ElonFollowers => IndexScale::Count,
            PredefinedIndex::BtcPrice | PredefinedIndex::TeslaStock => IndexScale::UsdCents,
        }
    }

    #[must_use]
    pub const fn source_url(self) -> &'static str {
        match self {
            PredefinedIndex::InflationRate => "https://www.bls.gov/cpi/",
            PredefinedIndex::ElonFollowers => "https://x.com/elonmusk",
            PredefinedIndex::BtcPrice => "https://www.coingecko.com/en/coins/bitcoin",
            PredefinedIndex::VixIndex => "https://www.cboe.com/tradable_products/vix/",
            PredefinedIndex::UnemploymentRate => "https://www.bls.gov/cps/",
            PredefinedIndex::TeslaStock => "https://finance.yahoo.com/quote/TSLA/",
        }
    }

    /// Seed value in the index's own scale.
    #[must_use]
    pub fn seed_value(self) -> U256 {
        let raw: u64 = match self {
            PredefinedIndex::InflationRate => 320,
            PredefinedIndex::ElonFollowers => 150_000_000,
            PredefinedIndex::BtcPrice => 4_300_000,
            PredefinedIndex::VixIndex => 1_850,
            PredefinedIndex::UnemploymentRate => 370,
            PredefinedIndex::TeslaStock => 25_000,
        };
        U256::from(raw)
    }
}
