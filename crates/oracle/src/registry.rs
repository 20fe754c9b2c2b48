//! In-process hybrid index registry.
//!
//! Each index is answered either by its administered value (`STATIC`) or by a
//! push feed (`FEED`). A `FEED` index resolves its feed address as: the
//! per-index override, else the registry default, else none. With no feed the
//! administered value is served.

use crate::error::OracleError;
use crate::feed::FeedSource;
use crate::index::{
    Index, IndexValue, OracleType, PredefinedIndex, FIRST_CUSTOM_INDEX_ID,
};
use crate::OracleReader;
use async_trait::async_trait;
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
struct RegistryState {
    indices: BTreeMap<u64, Index>,
    next_id: u64,
    default_feed: Option<Address>,
}

/// Owner-administered index registry.
pub struct IndexRegistry {
    owner: Address,
    contract_address: Address,
    feed: Arc<dyn FeedSource>,
    state: RwLock<RegistryState>,
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("owner", &self.owner)
            .field("contract_address", &self.contract_address)
            .field("indices", &self.state.read().indices.len())
            .finish_non_exhaustive()
    }
}

fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

impl IndexRegistry {
    /// Creates a registry seeded with every predefined index, all `STATIC` and active.
    ///
    /// `contract_address` is the on-chain oracle that predicates call at fill time.
    pub fn new(owner: Address, contract_address: Address, feed: Arc<dyn FeedSource>) -> Self {
        let seeded_at = now_secs();
        let indices = PredefinedIndex::ALL
            .iter()
            .map(|p| {
                (
                    p.id(),
                    Index {
                        id: p.id(),
                        value: p.seed_value(),
                        timestamp: seeded_at,
                        source_url: p.source_url().to_string(),
                        is_active: true,
                        oracle_type: OracleType::Static,
                        feed_address: None,
                        unavailable: None,
                    },
                )
            })
            .collect();

        Self {
            owner,
            contract_address,
            feed,
            state: RwLock::new(RegistryState {
                indices,
                next_id: FIRST_CUSTOM_INDEX_ID,
                default_feed: None,
            }),
        }
    }

    #[must_use]
    pub fn owner(&self) -> Address {
        self.owner
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), OracleError> {
        if caller == self.owner {
            Ok(())
        } else {
            warn!(caller = ?caller, "Rejected registry mutation from non-owner");
            Err(OracleError::Unauthorized(format!(
                "{caller:?} is not the registry owner"
            )))
        }
    }

    fn lookup(&self, index_id: u64) -> Result<Index, OracleError> {
        self.state
            .read()
            .indices
            .get(&index_id)
            .cloned()
            .ok_or(OracleError::UnknownIndex(index_id))
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Allocates the next custom id.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for non-owners, `InvalidArgument` for an empty source URL.
    pub fn create_custom_index(
        &self,
        caller: Address,
        initial_value: U256,
        source_url: &str,
    ) -> Result<u64, OracleError> {
        self.ensure_owner(caller)?;
        if source_url.trim().is_empty() {
            return Err(OracleError::InvalidArgument("source URL cannot be empty".into()));
        }

        let mut state = self.state.write();
        let id = state.next_id;
        state.next_id += 1;
        state.indices.insert(
            id,
            Index {
                id,
                value: initial_value,
                timestamp: now_secs(),
                source_url: source_url.to_string(),
                is_active: true,
                oracle_type: OracleType::Static,
                feed_address: None,
                unavailable: None,
            },
        );
        info!(index_id = id, source_url, "Custom index created");
        Ok(id)
    }

    /// Sets the administered value. The timestamp always moves strictly forward.
    ///
    /// # Errors
    ///
    /// `Unauthorized` or `UnknownIndex`.
    pub fn update_index(&self, caller: Address, index_id: u64, value: U256) -> Result<(), OracleError> {
        self.ensure_owner(caller)?;
        let mut state = self.state.write();
        let index = state
            .indices
            .get_mut(&index_id)
            .ok_or(OracleError::UnknownIndex(index_id))?;
        apply_update(index, value, now_secs());
        info!(index_id, value = %value, timestamp = index.timestamp, "Index updated");
        Ok(())
    }

    /// Applies every update or none of them.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, or `UnknownIndex` for the first unassigned id.
    pub fn batch_update_indices(
        &self,
        caller: Address,
        updates: &[(u64, U256)],
    ) -> Result<(), OracleError> {
        self.ensure_owner(caller)?;
        let mut state = self.state.write();
        if let Some((missing, _)) = updates.iter().find(|(id, _)| !state.indices.contains_key(id)) {
            return Err(OracleError::UnknownIndex(*missing));
        }
        let now = now_secs();
        for (id, value) in updates {
            if let Some(index) = state.indices.get_mut(id) {
                apply_update(index, *value, now);
            }
        }
        info!(count = updates.len(), "Batch index update applied");
        Ok(())
    }

    /// # Errors
    ///
    /// `Unauthorized` or `UnknownIndex`.
    pub fn set_index_active(&self, caller: Address, index_id: u64, active: bool) -> Result<(), OracleError> {
        self.ensure_owner(caller)?;
        let mut state = self.state.write();
        let index = state
            .indices
            .get_mut(&index_id)
            .ok_or(OracleError::UnknownIndex(index_id))?;
        index.is_active = active;
        info!(index_id, active, "Index activation changed");
        Ok(())
    }

    /// Switches the backend. Id, value history and source URL are untouched.
    ///
    /// # Errors
    ///
    /// `Unauthorized` or `UnknownIndex`.
    pub fn set_index_oracle_type(
        &self,
        caller: Address,
        index_id: u64,
        oracle_type: OracleType,
    ) -> Result<(), OracleError> {
        self.batch_set_oracle_types(caller, &[(index_id, oracle_type)])
    }

    /// # Errors
    ///
    /// `Unauthorized`, or `UnknownIndex` for the first unassigned id. Nothing is applied on error.
    pub fn batch_set_oracle_types(
        &self,
        caller: Address,
        changes: &[(u64, OracleType)],
    ) -> Result<(), OracleError> {
        self.ensure_owner(caller)?;
        let mut state = self.state.write();
        if let Some((missing, _)) = changes.iter().find(|(id, _)| !state.indices.contains_key(id)) {
            return Err(OracleError::UnknownIndex(*missing));
        }
        for (id, oracle_type) in changes {
            if let Some(index) = state.indices.get_mut(id) {
                index.oracle_type = *oracle_type;
                info!(index_id = id, oracle_type = %oracle_type, "Index oracle type changed");
            }
        }
        Ok(())
    }

    /// Sets the per-index feed. The zero address clears the override.
    ///
    /// # Errors
    ///
    /// `Unauthorized` or `UnknownIndex`.
    pub fn set_index_oracle_address(
        &self,
        caller: Address,
        index_id: u64,
        feed: Address,
    ) -> Result<(), OracleError> {
        self.ensure_owner(caller)?;
        let mut state = self.state.write();
        let index = state
            .indices
            .get_mut(&index_id)
            .ok_or(OracleError::UnknownIndex(index_id))?;
        index.feed_address = (!feed.is_zero()).then_some(feed);
        info!(index_id, feed = ?feed, "Index feed address changed");
        Ok(())
    }

    /// Sets the registry-wide fallback feed. The zero address clears it.
    ///
    /// # Errors
    ///
    /// `Unauthorized`.
    pub fn set_default_oracle_address(&self, caller: Address, feed: Address) -> Result<(), OracleError> {
        self.ensure_owner(caller)?;
        self.state.write().default_feed = (!feed.is_zero()).then_some(feed);
        info!(feed = ?feed, "Default feed address changed");
        Ok(())
    }

    fn resolve_feed(&self, index: &Index) -> Option<Address> {
        index.feed_address.or(self.state.read().default_feed)
    }

    /// Value served for `index`: the feed for `FEED` indices with a resolvable
    /// feed, the administered value otherwise. Must be called without the lock held.
    async fn read_live(&self, index: &Index) -> Result<IndexValue, OracleError> {
        let administered = IndexValue {
            value: index.value,
            timestamp: index.timestamp,
        };
        if index.oracle_type == OracleType::Static {
            return Ok(administered);
        }
        let Some(feed) = self.resolve_feed(index) else {
            return Ok(administered);
        };

        self.feed
            .latest(feed)
            .await
            .map_err(|e| OracleError::Unavailable {
                index_id: index.id,
                reason: e.to_string(),
            })
    }

    /// Replaces the stored value with what `get_value` would serve. A failing
    /// feed keeps the administered value and marks the index unavailable.
    async fn with_live_value(&self, mut index: Index) -> Index {
        if !index.is_active {
            return index;
        }
        match self.read_live(&index).await {
            Ok(reading) => {
                index.value = reading.value;
                index.timestamp = reading.timestamp;
            }
            Err(e) => {
                warn!(index_id = index.id, error = %e, "Serving index without a live value");
                index.unavailable = Some(e.to_string());
            }
        }
        index
    }
}

fn apply_update(index: &mut Index, value: U256, now: u64) {
    index.value = value;
    index.timestamp = now.max(index.timestamp + 1);
}

#[async_trait]
impl OracleReader for IndexRegistry {
    fn contract_address(&self) -> Address {
        self.contract_address
    }

    async fn get_value(&self, index_id: u64) -> Result<IndexValue, OracleError> {
        let index = self.lookup(index_id)?;
        if !index.is_active {
            return Err(OracleError::UnknownIndex(index_id));
        }
        self.read_live(&index).await
    }

    async fn get_index(&self, index_id: u64) -> Result<Index, OracleError> {
        let index = self.lookup(index_id)?;
        Ok(self.with_live_value(index).await)
    }

    async fn is_valid_index(&self, index_id: u64) -> Result<bool, OracleError> {
        Ok(self
            .state
            .read()
            .indices
            .get(&index_id)
            .is_some_and(|i| i.is_active))
    }

    async fn get_oracle_type(&self, index_id: u64) -> Result<OracleType, OracleError> {
        Ok(self.lookup(index_id)?.oracle_type)
    }

    async fn get_oracle_address(&self, index_id: u64) -> Result<Address, OracleError> {
        let index = self.lookup(index_id)?;
        Ok(self.resolve_feed(&index).unwrap_or_else(Address::zero))
    }

    async fn list_indices(&self) -> Result<Vec<Index>, OracleError> {
        let stored: Vec<Index> = self.state.read().indices.values().cloned().collect();
        let mut indices = Vec::with_capacity(stored.len());
        for index in stored {
            indices.push(self.with_live_value(index).await);
        }
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::InMemoryFeed;

    fn owner() -> Address {
        Address::repeat_byte(0x01)
    }

    fn registry() -> (IndexRegistry, Arc<InMemoryFeed>) {
        let feed = Arc::new(InMemoryFeed::new());
        let registry = IndexRegistry::new(owner(), Address::repeat_byte(0x0c), feed.clone());
        (registry, feed)
    }

    // =========================================================================
    // Seeding and updates
    // =========================================================================

    #[tokio::test]
    async fn fresh_registry_serves_seed_values() {
        let (registry, _) = registry();
        let value = registry.get_value(0).await.unwrap();
        assert_eq!(value.value, PredefinedIndex::InflationRate.seed_value());
        assert!(registry.get_index(0).await.unwrap().is_active);
        assert_eq!(registry.list_indices().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn update_moves_timestamp_strictly_forward() {
        let (registry, _) = registry();
        let before = registry.get_value(0).await.unwrap();

        registry.update_index(owner(), 0, U256::from(410)).unwrap();
        let after = registry.get_value(0).await.unwrap();

        assert_eq!(after.value, U256::from(410));
        assert!(after.timestamp > before.timestamp);

        registry.update_index(owner(), 0, U256::from(415)).unwrap();
        assert!(registry.get_value(0).await.unwrap().timestamp > after.timestamp);
    }

    #[tokio::test]
    async fn custom_ids_start_after_predefined_range() {
        let (registry, _) = registry();
        let first = registry
            .create_custom_index(owner(), U256::from(5), "https://example.org/a")
            .unwrap();
        let second = registry
            .create_custom_index(owner(), U256::from(6), "https://example.org/b")
            .unwrap();
        assert_eq!(first, FIRST_CUSTOM_INDEX_ID);
        assert_eq!(second, first + 1);
        assert!(registry.is_valid_index(second).await.unwrap());
    }

    #[tokio::test]
    async fn unassigned_and_inactive_indices_are_unknown() {
        let (registry, _) = registry();
        assert!(matches!(
            registry.get_value(99).await,
            Err(OracleError::UnknownIndex(99))
        ));

        registry.set_index_active(owner(), 2, false).unwrap();
        assert!(matches!(
            registry.get_value(2).await,
            Err(OracleError::UnknownIndex(2))
        ));
        assert!(!registry.is_valid_index(2).await.unwrap());
    }

    #[tokio::test]
    async fn batch_update_is_all_or_nothing() {
        let (registry, _) = registry();
        let err = registry
            .batch_update_indices(owner(), &[(1, U256::from(1)), (77, U256::from(2))])
            .unwrap_err();
        assert!(matches!(err, OracleError::UnknownIndex(77)));
        assert_eq!(
            registry.get_value(1).await.unwrap().value,
            PredefinedIndex::ElonFollowers.seed_value()
        );
    }

    #[test]
    fn non_owner_cannot_mutate() {
        let (registry, _) = registry();
        let stranger = Address::repeat_byte(0x99);
        assert!(matches!(
            registry.update_index(stranger, 0, U256::one()),
            Err(OracleError::Unauthorized(_))
        ));
        assert!(registry.set_default_oracle_address(stranger, Address::repeat_byte(2)).is_err());
        assert!(registry.create_custom_index(stranger, U256::one(), "x").is_err());
    }

    // =========================================================================
    // Feed resolution
    // =========================================================================

    #[tokio::test]
    async fn oracle_type_switch_preserves_identity() {
        let (registry, feed) = registry();
        let original = registry.get_index(3).await.unwrap();
        let vix_feed = Address::repeat_byte(0xf3);
        feed.publish(vix_feed, U256::from(2_100), 1_800_000_000);

        registry.set_index_oracle_address(owner(), 3, vix_feed).unwrap();
        registry.set_index_oracle_type(owner(), 3, OracleType::Feed).unwrap();
        let as_feed = registry.get_index(3).await.unwrap();
        assert_eq!(registry.get_value(3).await.unwrap().value, U256::from(2_100));

        registry.set_index_oracle_type(owner(), 3, OracleType::Static).unwrap();
        let back = registry.get_index(3).await.unwrap();

        for snapshot in [&as_feed, &back] {
            assert_eq!(snapshot.id, original.id);
            assert_eq!(snapshot.source_url, original.source_url);
        }
        assert_eq!(back.oracle_type, OracleType::Static);
        assert_eq!(registry.get_value(3).await.unwrap().value, original.value);
    }

    #[tokio::test]
    async fn feed_address_falls_back_to_default_then_zero() {
        let (registry, _) = registry();
        assert_eq!(registry.get_oracle_address(2).await.unwrap(), Address::zero());

        let default_feed = Address::repeat_byte(0xd0);
        registry.set_default_oracle_address(owner(), default_feed).unwrap();
        assert_eq!(registry.get_oracle_address(2).await.unwrap(), default_feed);

        let own_feed = Address::repeat_byte(0xd2);
        registry.set_index_oracle_address(owner(), 2, own_feed).unwrap();
        assert_eq!(registry.get_oracle_address(2).await.unwrap(), own_feed);

        registry.set_index_oracle_address(owner(), 2, Address::zero()).unwrap();
        assert_eq!(registry.get_oracle_address(2).await.unwrap(), default_feed);
    }

    #[tokio::test]
    async fn feed_index_without_any_feed_serves_static_value() {
        let (registry, _) = registry();
        registry.set_index_oracle_type(owner(), 5, OracleType::Feed).unwrap();
        let value = registry.get_value(5).await.unwrap();
        assert_eq!(value.value, PredefinedIndex::TeslaStock.seed_value());
    }

    #[tokio::test]
    async fn feed_failure_only_affects_its_index() {
        let (registry, feed) = registry();
        let btc_feed = Address::repeat_byte(0xb7);
        feed.fail(btc_feed, "round not complete");
        registry.set_index_oracle_address(owner(), 2, btc_feed).unwrap();
        registry.batch_set_oracle_types(owner(), &[(2, OracleType::Feed)]).unwrap();

        let err = registry.get_value(2).await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable { index_id: 2, .. }));
        assert!(registry.get_value(1).await.is_ok());
        assert!(registry.get_value(3).await.is_ok());

        let listed = registry.list_indices().await.unwrap();
        assert_eq!(listed.len(), 6);
        let btc = listed.iter().find(|i| i.id == 2).unwrap();
        assert!(!btc.has_live_value());
        assert_eq!(btc.value, PredefinedIndex::BtcPrice.seed_value());
        assert!(listed.iter().filter(|i| i.id != 2).all(Index::has_live_value));
    }

    #[tokio::test]
    async fn index_reads_agree_with_get_value_for_feed_indices() {
        let (registry, feed) = registry();
        let btc_feed = Address::repeat_byte(0xb7);
        feed.publish(btc_feed, U256::from(99_999), 1_900_000_000);
        registry.set_default_oracle_address(owner(), btc_feed).unwrap();
        registry.set_index_oracle_type(owner(), 2, OracleType::Feed).unwrap();

        let value = registry.get_value(2).await.unwrap();
        let index = registry.get_index(2).await.unwrap();
        assert_eq!(value.value, U256::from(99_999));
        assert_eq!((index.value, index.timestamp), (value.value, value.timestamp));
        assert!(index.has_live_value());

        let listed = registry.list_indices().await.unwrap();
        let btc = listed.iter().find(|i| i.id == 2).unwrap();
        assert_eq!((btc.value, btc.timestamp), (value.value, value.timestamp));
        let vix = listed.iter().find(|i| i.id == 3).unwrap();
        assert_eq!(vix.value, PredefinedIndex::VixIndex.seed_value());
    }
}
