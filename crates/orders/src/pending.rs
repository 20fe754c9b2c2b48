//! Pending order store bridging prepare and submit.
//!
//! `take` is destructive: each prepared order can be submitted at most once.
//! Entries expire at `min(created + ttl, order expiration)` and are dropped by
//! a periodic sweep.

use crate::order::LimitOrder;
use async_trait::async_trait;
use condswap_core::{Condition, ErrorCode, HasErrorCode};
use ethers::types::H256;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// An unsigned order awaiting its maker's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    pub id: String,
    pub order: LimitOrder,
    pub order_hash: H256,
    pub condition: Condition,
    pub created_at: u64,
    pub expires_at: u64,
}

impl PendingOrder {
    #[must_use]
    pub fn is_expired(&self, now_secs: u64) -> bool {
        now_secs >= self.expires_at
    }
}

/// Handle returned by `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTicket {
    pub id: String,
    pub expires_at: u64,
}

/// Why a `take` returned nothing. Both carry the requested id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PendingStoreError {
    /// Never issued or already consumed.
    #[error("pending order '{0}' was never issued or has already been submitted")]
    NotFound(String),
    /// Issued but aged out before submission.
    #[error("pending order '{0}' has expired")]
    Expired(String),
}

impl PendingStoreError {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            PendingStoreError::NotFound(id) | PendingStoreError::Expired(id) => id,
        }
    }
}

impl HasErrorCode for PendingStoreError {
    fn code(&self) -> ErrorCode {
        ErrorCode::OrderNotFound
    }
}

/// Keyed single-use storage for prepared orders.
#[async_trait]
pub trait PendingOrderStore: Send + Sync {
    /// Stores a prepared order under a fresh opaque id.
    async fn put(
        &self,
        order: LimitOrder,
        order_hash: H256,
        condition: Condition,
        now_secs: u64,
    ) -> PendingTicket;

    /// Removes and returns the order. Concurrent takes of one id: exactly one succeeds.
    async fn take(&self, id: &str, now_secs: u64) -> Result<PendingOrder, PendingStoreError>;

    /// Drops expired entries and returns how many were removed.
    async fn sweep_expired(&self, now_secs: u64) -> usize;

    async fn len(&self) -> usize;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug)]
pub struct InMemoryPendingStore {
    ttl: Duration,
    orders: Mutex<HashMap<String, PendingOrder>>,
}

impl InMemoryPendingStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            orders: Mutex::new(HashMap::new()),
        }
    }

    fn expiry_for(&self, order: &LimitOrder, now_secs: u64) -> u64 {
        let by_ttl = now_secs.saturating_add(self.ttl.as_secs());
        match order.expiration() {
            0 => by_ttl,
            on_chain => by_ttl.min(on_chain),
        }
    }
}

#[async_trait]
impl PendingOrderStore for InMemoryPendingStore {
    async fn put(
        &self,
        order: LimitOrder,
        order_hash: H256,
        condition: Condition,
        now_secs: u64,
    ) -> PendingTicket {
        let id = Uuid::new_v4().to_string();
        let expires_at = self.expiry_for(&order, now_secs);
        let pending = PendingOrder {
            id: id.clone(),
            order,
            order_hash,
            condition,
            created_at: now_secs,
            expires_at,
        };
        self.orders.lock().insert(id.clone(), pending);
        debug!(order_id = %id, order_hash = ?order_hash, expires_at, "Pending order stored");
        PendingTicket { id, expires_at }
    }

    async fn take(&self, id: &str, now_secs: u64) -> Result<PendingOrder, PendingStoreError> {
        let removed = self.orders.lock().remove(id);
        match removed {
            Some(pending) if pending.is_expired(now_secs) => {
                Err(PendingStoreError::Expired(id.to_string()))
            }
            Some(pending) => Ok(pending),
            None => Err(PendingStoreError::NotFound(id.to_string())),
        }
    }

    async fn sweep_expired(&self, now_secs: u64) -> usize {
        let mut orders = self.orders.lock();
        let before = orders.len();
        orders.retain(|_, pending| !pending.is_expired(now_secs));
        before - orders.len()
    }

    async fn len(&self) -> usize {
        self.orders.lock().len()
    }
}

/// Runs `sweep_expired` every `interval` until the runtime shuts down.
pub fn spawn_sweeper(store: Arc<dyn PendingOrderStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
            let removed = store.sweep_expired(now).await;
            if removed > 0 {
                let remaining = store.len().await;
                info!(removed, remaining, "Swept expired pending orders");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maker_traits::MakerTraits;
    use condswap_core::Operator;
    use ethers::types::{Address, Bytes, U256};

    fn order(expiration: u64) -> LimitOrder {
        LimitOrder {
            salt: U256::from(1),
            maker: Address::repeat_byte(0xaa),
            receiver: Address::zero(),
            maker_asset: Address::repeat_byte(1),
            taker_asset: Address::repeat_byte(2),
            making_amount: U256::from(10),
            taking_amount: U256::from(20),
            maker_traits: MakerTraits::new().with_expiration(expiration),
            extension: Bytes::new(),
        }
    }

    fn condition() -> Condition {
        Condition::new(3, Operator::Lt, U256::from(1500))
    }

    fn store() -> InMemoryPendingStore {
        InMemoryPendingStore::new(Duration::from_secs(1_800))
    }

    #[tokio::test]
    async fn take_is_single_use() {
        let store = store();
        let id = store.put(order(0), H256::repeat_byte(1), condition(), 1_000).await.id;

        let taken = store.take(&id, 1_001).await.unwrap();
        assert_eq!(taken.order_hash, H256::repeat_byte(1));
        let err = store.take(&id, 1_002).await.unwrap_err();
        assert_eq!(err, PendingStoreError::NotFound(id.clone()));
        assert_eq!(err.code(), ErrorCode::OrderNotFound);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let err = store().take("nope", 0).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    async fn ttl_is_capped_by_order_expiration() {
        let store = store();
        let ticket = store.put(order(1_100), H256::zero(), condition(), 1_000).await;
        assert_eq!(ticket.expires_at, 1_100);
        let id = ticket.id;
        assert_eq!(
            store.take(&id, 1_100).await,
            Err(PendingStoreError::Expired(id.clone()))
        );

        let ticket = store.put(order(0), H256::zero(), condition(), 1_000).await;
        assert_eq!(ticket.expires_at, 2_800);
        assert!(store.take(&ticket.id, 2_799).await.is_ok());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let store = store();
        store.put(order(1_050), H256::zero(), condition(), 1_000).await;
        let keep = store.put(order(0), H256::zero(), condition(), 1_000).await.id;

        assert_eq!(store.sweep_expired(1_060).await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.take(&keep, 1_060).await.is_ok());
    }

    #[tokio::test]
    async fn sweeper_task_evicts_expired_orders() {
        let store: Arc<dyn PendingOrderStore> = Arc::new(store());
        store.put(order(1), H256::zero(), condition(), 0).await;
        assert_eq!(store.len().await, 1);

        let sweeper = spawn_sweeper(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.abort();

        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_takes_have_exactly_one_winner() {
        let store = Arc::new(store());
        let id = store.put(order(0), H256::zero(), condition(), 1_000).await.id;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { store.take(&id, 1_001).await.is_ok() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
