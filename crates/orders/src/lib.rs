//! Conditional limit-order pipeline.
//!
//! An order is only fillable once an oracle index satisfies a threshold
//! comparison. The condition travels inside the order's extension as a
//! predicate the settlement protocol evaluates at fill time.
//!
//! # Flow
//!
//! ```text
//! prepare ─► OrderBuilder ─► PendingOrderStore ─► (maker signs) ─► submit ─► OrderBook
//!                                                                   │
//!                                                     ConditionMonitor polls oracle + book
//! ```

pub mod approvals;
pub mod builder;
pub mod cancel;
pub mod eip712;
pub mod error;
pub mod extension;
pub mod maker_traits;
pub mod monitor;
pub mod order;
pub mod order_book;
pub mod pending;
pub mod predicate;
pub mod retry;
pub mod service;
pub mod signature;
pub mod tokens;
pub mod types;

pub use approvals::ApprovalHint;
pub use builder::{BuiltOrder, OrderBuilder, OrderDraft, OrderSeed};
pub use cancel::{CancelCheck, CancelTransaction};
pub use eip712::Eip712Domain;
pub use error::OrderError;
pub use extension::Extension;
pub use maker_traits::MakerTraits;
pub use monitor::{ConditionMonitor, MonitorReport, TrackedOrder};
pub use order::LimitOrder;
pub use order_book::{
    MakerOrdersFilter, OrderBook, OrderBookClient, OrderBookClientConfig, OrderBookEntry,
    SubmissionError, SubmissionReceipt,
};
pub use pending::{
    spawn_sweeper, InMemoryPendingStore, PendingOrder, PendingOrderStore, PendingStoreError,
    PendingTicket,
};
pub use predicate::{decode_predicate, encode_predicate, Comparison, DecodedPredicate};
pub use retry::BackoffPolicy;
pub use service::OrderPipeline;
pub use tokens::{Token, TokenRegistry};
