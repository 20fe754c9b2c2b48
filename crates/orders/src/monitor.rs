//! Condition monitor.
//!
//! Polls every tracked order on a fixed interval: re-reads the condition's
//! index, evaluates the truth table, and asks the order book for the order's
//! status. It only reports. Filling is the taker's job and cancelling the
//! maker's.
//!
//! A failed or timed-out call degrades that order's report for one round and
//! the loop carries on. Orders that reach a terminal state leave tracking.

use crate::order_book::OrderBook;
use condswap_core::units::u256_dec;
use condswap_core::{Condition, OrderState};
use condswap_oracle::{IndexValue, OracleReader};
use ethers::types::{Address, H256, U256};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the report broadcast channel.
const REPORT_CHANNEL_CAPACITY: usize = 256;

/// How long the last report of a terminal order stays in the snapshot by default.
const DEFAULT_REPORT_RETENTION: Duration = Duration::from_secs(3_600);

/// An order under observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOrder {
    pub order_hash: H256,
    pub maker: Address,
    pub condition: Condition,
    /// Unix seconds, 0 for none.
    pub expiration: u64,
    pub state: OrderState,
}

/// Result of one poll of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorReport {
    pub order_hash: H256,
    pub maker: Address,
    pub condition: Condition,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub index_value: Option<U256>,
    pub index_timestamp: Option<u64>,
    /// `None` when the index could not be read this round.
    pub condition_met: Option<bool>,
    pub state: OrderState,
    pub error: Option<String>,
    pub checked_at: u64,
}

fn serialize_opt_u256<S: serde::Serializer>(value: &Option<U256>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => u256_dec::serialize(v, s),
        None => s.serialize_none(),
    }
}

pub struct ConditionMonitor {
    oracle: Arc<dyn OracleReader>,
    book: Arc<dyn OrderBook>,
    call_timeout: Duration,
    report_retention: Duration,
    tracked: RwLock<HashMap<H256, TrackedOrder>>,
    reports: RwLock<HashMap<H256, MonitorReport>>,
    events: broadcast::Sender<MonitorReport>,
}

impl ConditionMonitor {
    #[must_use]
    pub fn new(oracle: Arc<dyn OracleReader>, book: Arc<dyn OrderBook>, call_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            oracle,
            book,
            call_timeout,
            report_retention: DEFAULT_REPORT_RETENTION,
            tracked: RwLock::new(HashMap::new()),
            reports: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Keeps terminal orders' last reports for `retention` after their final poll.
    #[must_use]
    pub fn with_report_retention(mut self, retention: Duration) -> Self {
        self.report_retention = retention;
        self
    }

    pub fn track(&self, order: TrackedOrder) {
        info!(
            order_hash = ?order.order_hash,
            condition = %order.condition,
            "Tracking order"
        );
        self.tracked.write().insert(order.order_hash, order);
    }

    #[must_use]
    pub fn tracked(&self) -> Vec<TrackedOrder> {
        self.tracked.read().values().cloned().collect()
    }

    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.read().len()
    }

    /// Latest report per order. Orders that left tracking stay for the retention window.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MonitorReport> {
        let mut reports: Vec<_> = self.reports.read().values().cloned().collect();
        reports.sort_by_key(|r| std::cmp::Reverse(r.checked_at));
        reports
    }

    #[must_use]
    pub fn report_for(&self, order_hash: &H256) -> Option<MonitorReport> {
        self.reports.read().get(order_hash).cloned()
    }

    /// Receives every report as it is produced.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorReport> {
        self.events.subscribe()
    }

    /// Polls every tracked order once.
    pub async fn poll_once(&self, now_secs: u64) -> Vec<MonitorReport> {
        let orders = self.tracked();
        let mut values: HashMap<u64, Result<IndexValue, String>> = HashMap::new();
        let mut reports = Vec::with_capacity(orders.len());

        for order in orders {
            let index_id = order.condition.index_id;
            if !values.contains_key(&index_id) {
                let read = self
                    .bounded("oracle read", self.oracle.get_value(index_id))
                    .await;
                values.insert(index_id, read);
            }
            let mut errors = Vec::new();
            let (index_value, index_timestamp, condition_met) = match &values[&index_id] {
                Ok(v) => (Some(v.value), Some(v.timestamp), Some(order.condition.evaluate(v.value))),
                Err(e) => {
                    errors.push(e.clone());
                    (None, None, None)
                }
            };

            let observed = match self
                .bounded("order book read", self.book.get_order_by_hash(order.order_hash))
                .await
            {
                Ok(Some(entry)) => Some(entry.observed_state(now_secs)),
                Ok(None) => None,
                Err(e) => {
                    errors.push(e);
                    None
                }
            };
            let observed = observed.or_else(|| {
                (order.expiration != 0 && now_secs >= order.expiration).then_some(OrderState::Expired)
            });
            let state = observed.map_or(order.state, |o| advance(order.state, o));

            let error = (!errors.is_empty()).then(|| errors.join("; "));
            if let Some(e) = &error {
                warn!(order_hash = ?order.order_hash, error = %e, "Monitor poll degraded");
            }
            if state != order.state {
                info!(
                    order_hash = ?order.order_hash,
                    from = %order.state,
                    to = %state,
                    "Order state changed"
                );
            }

            let report = MonitorReport {
                order_hash: order.order_hash,
                maker: order.maker,
                condition: order.condition,
                index_value,
                index_timestamp,
                condition_met,
                state,
                error,
                checked_at: now_secs,
            };
            self.record(&report);
            reports.push(report);
        }

        let pruned = self.prune_reports(now_secs);
        debug!(
            polled = reports.len(),
            remaining = self.tracked_count(),
            pruned,
            "Monitor poll complete"
        );
        reports
    }

    /// Drops reports of terminal orders older than the retention window.
    fn prune_reports(&self, now_secs: u64) -> usize {
        let retention = self.report_retention.as_secs();
        let mut reports = self.reports.write();
        let before = reports.len();
        reports.retain(|_, r| !r.state.is_terminal() || r.checked_at.saturating_add(retention) > now_secs);
        before - reports.len()
    }

    fn record(&self, report: &MonitorReport) {
        {
            let mut tracked = self.tracked.write();
            if report.state.is_terminal() {
                tracked.remove(&report.order_hash);
            } else if let Some(order) = tracked.get_mut(&report.order_hash) {
                order.state = report.state;
            }
        }
        self.reports.write().insert(report.order_hash, report.clone());
        // No subscribers is fine.
        let _ = self.events.send(report.clone());
    }

    async fn bounded<T, E: std::fmt::Display>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, String> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(format!("{what} failed: {e}")),
            Err(_) => Err(format!("{what} timed out after {:?}", self.call_timeout)),
        }
    }

    /// Polls on `interval` until the runtime shuts down.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), "Starting condition monitor");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
                self.poll_once(now).await;
            }
        })
    }
}

/// Moves `current` toward `observed` along lifecycle edges. A submitted order
/// seen in a post-active state is taken to have passed through `Active`.
fn advance(current: OrderState, observed: OrderState) -> OrderState {
    if current == observed || current.can_transition_to(observed) {
        return observed;
    }
    if current == OrderState::Submitted && OrderState::Active.can_transition_to(observed) {
        return observed;
    }
    current
}
