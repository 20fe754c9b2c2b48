//! Hybrid index oracle.
//!
//! Two interchangeable readers implement [`OracleReader`]:
//! - [`IndexRegistry`]: in-process, owner-administered, seeded with the predefined indices
//! - [`RpcOracle`]: `eth_call` against the deployed oracle contract
//!
//! Both resolve `FEED` indices through the per-index feed, then the registry
//! default, then the administered value.

pub mod contract;
pub mod error;
pub mod feed;
pub mod index;
pub mod registry;
pub mod rpc;

pub use contract::{get_value_calldata, RpcOracle};
pub use error::OracleError;
pub use feed::{FeedSource, InMemoryFeed, RpcFeed};
pub use index::{
    Index, IndexScale, IndexValue, OracleType, PredefinedIndex, FIRST_CUSTOM_INDEX_ID,
    PREDEFINED_INDEX_COUNT,
};
pub use registry::IndexRegistry;
pub use rpc::JsonRpcClient;

use async_trait::async_trait;
use ethers::types::Address;

/// Read side of the oracle, shared by the order builder and the condition monitor.
#[async_trait]
pub trait OracleReader: Send + Sync {
    /// Address of the oracle contract predicates call at fill time.
    fn contract_address(&self) -> Address;

    /// Current `(value, timestamp)`. Fails with `UnknownIndex` for unassigned or inactive ids.
    async fn get_value(&self, index_id: u64) -> Result<IndexValue, OracleError>;

    async fn get_index(&self, index_id: u64) -> Result<Index, OracleError>;

    async fn is_valid_index(&self, index_id: u64) -> Result<bool, OracleError>;

    async fn get_oracle_type(&self, index_id: u64) -> Result<OracleType, OracleError>;

    /// Per-index feed, else the default feed, else the zero address.
    async fn get_oracle_address(&self, index_id: u64) -> Result<Address, OracleError>;

    async fn list_indices(&self) -> Result<Vec<Index>, OracleError>;
}
