//! Limit-order book API client.
//!
//! Submits signed v4 orders and reads them back by hash or by maker. Every
//! request passes a shared `governor` limiter and carries an explicit timeout.
//!
//! # Endpoints
//!
//! - `POST {base}/orderbook/v4.0/{chain}`: submit `{orderHash, signature, data}`
//! - `GET  {base}/orderbook/v4.0/{chain}/order/{hash}`
//! - `GET  {base}/orderbook/v4.0/{chain}/address/{maker}?page&limit&statuses`

use crate::order::LimitOrder;
use crate::retry::BackoffPolicy;
use async_trait::async_trait;
use condswap_core::{AppConfig, ErrorCode, HasErrorCode, OrderState};
use ethers::types::{Address, Signature, H256, U256};
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// Constants
// =============================================================================

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Fallback when the configured rate is zero.
const DEFAULT_REQUESTS_PER_MINUTE: NonZeroU32 = nonzero!(60u32);

/// Book statuses requested when listing a maker's orders: valid, temporarily invalid, invalid.
pub const ALL_STATUSES: [u8; 3] = [1, 2, 3];

// =============================================================================
// Error Types
// =============================================================================

/// Submission and read failures, grouped into the four submission sub-codes.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The book refused the order because the maker has not approved the protocol.
    #[error("Insufficient allowance: {0}")]
    Allowance(String),

    /// Protocol-level validation failure. Never retried.
    #[error("Order rejected ({status}): {message}")]
    Reverted { status: u16, message: String },

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Order book error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl SubmissionError {
    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SubmissionError::Reverted { .. })
    }

    /// Server-requested wait, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SubmissionError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl HasErrorCode for SubmissionError {
    fn code(&self) -> ErrorCode {
        match self {
            SubmissionError::Allowance(_) => ErrorCode::SubmissionAllowance,
            SubmissionError::Reverted { .. } => ErrorCode::SubmissionReverted,
            SubmissionError::RateLimited { .. } => ErrorCode::SubmissionRateLimited,
            SubmissionError::Http(_)
            | SubmissionError::Timeout(_)
            | SubmissionError::Server { .. }
            | SubmissionError::Parse(_) => ErrorCode::SubmissionUnknown,
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitOrderRequest<'a> {
    order_hash: String,
    signature: String,
    data: &'a LimitOrder,
}

/// Accepted submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub order_hash: H256,
    pub attempts: u32,
    /// Body returned by the book, `null` when empty.
    pub response: Value,
}

/// An order as the book reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookEntry {
    pub order_hash: H256,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub create_date_time: Option<String>,
    /// Unfilled maker amount, decimal string.
    #[serde(default)]
    pub remaining_maker_amount: Option<String>,
    /// 1 valid, 2 temporarily invalid, 3 invalid.
    #[serde(default)]
    pub status: Option<u8>,
    #[serde(default)]
    pub order_invalid_reason: Option<Value>,
    pub data: LimitOrder,
}

impl OrderBookEntry {
    #[must_use]
    pub fn remaining_maker_amount(&self) -> Option<U256> {
        self.remaining_maker_amount
            .as_deref()
            .and_then(condswap_core::units::parse_u256)
    }

    /// Invalid reason flattened to lowercase text.
    #[must_use]
    pub fn invalid_reason(&self) -> Option<String> {
        match self.order_invalid_reason.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.to_ascii_lowercase()),
            other => Some(other.to_string().to_ascii_lowercase()),
        }
    }

    /// Lifecycle state implied by the book entry at `now_secs`.
    #[must_use]
    pub fn observed_state(&self, now_secs: u64) -> OrderState {
        if self.remaining_maker_amount().is_some_and(|r| r.is_zero()) {
            return OrderState::Filled;
        }
        let reason = self.invalid_reason().unwrap_or_default();
        if reason.contains("cancel") {
            return OrderState::Cancelled;
        }
        if reason.contains("expire") || self.data.maker_traits.is_expired(now_secs) {
            return OrderState::Expired;
        }
        OrderState::Active
    }
}

/// Paging and status filter for maker listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakerOrdersFilter {
    pub page: u32,
    pub limit: u32,
    pub statuses: Vec<u8>,
}

impl Default for MakerOrdersFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 100,
            statuses: ALL_STATUSES.to_vec(),
        }
    }
}

impl MakerOrdersFilter {
    /// Orders the book still considers fillable.
    #[must_use]
    pub fn active() -> Self {
        Self {
            statuses: vec![1],
            ..Self::default()
        }
    }

    /// Unset values keep the current page and limit. The limit is capped at 500.
    #[must_use]
    pub fn with_page(mut self, page: Option<u32>, limit: Option<u32>) -> Self {
        if let Some(page) = page {
            self.page = page.max(1);
        }
        if let Some(limit) = limit {
            self.limit = limit.clamp(1, 500);
        }
        self
    }
}

// =============================================================================
// Order Book Trait
// =============================================================================

/// External order book. The HTTP client is the production implementation.
#[async_trait]
pub trait OrderBook: Send + Sync {
    async fn submit_order(
        &self,
        order: &LimitOrder,
        order_hash: H256,
        signature: &Signature,
    ) -> Result<SubmissionReceipt, SubmissionError>;

    /// `None` when the book does not know the hash.
    async fn get_order_by_hash(
        &self,
        order_hash: H256,
    ) -> Result<Option<OrderBookEntry>, SubmissionError>;

    async fn get_orders_by_maker(
        &self,
        maker: Address,
        filter: &MakerOrdersFilter,
    ) -> Result<Vec<OrderBookEntry>, SubmissionError>;
}

/// Submits with the policy's attempt budget. `Reverted` returns immediately.
///
/// # Errors
///
/// Returns the last error once retries are exhausted or a non-retryable error occurs.
pub async fn submit_with_retry(
    book: &dyn OrderBook,
    policy: &BackoffPolicy,
    order: &LimitOrder,
    order_hash: H256,
    signature: &Signature,
) -> Result<SubmissionReceipt, SubmissionError> {
    let mut attempt = 1;
    loop {
        match book.submit_order(order, order_hash, signature).await {
            Ok(mut receipt) => {
                receipt.attempts = attempt;
                return Ok(receipt);
            }
            Err(e) if e.is_retryable() && policy.should_retry(attempt) => {
                let delay = policy.delay_for(attempt, e.retry_after());
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Order submission failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(attempt, order_hash = ?order_hash, error = %e, "Order submission gave up");
                return Err(e);
            }
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct OrderBookClientConfig {
    pub base_url: String,
    pub chain_id: u64,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
    pub requests_per_minute: NonZeroU32,
}

impl OrderBookClientConfig {
    #[must_use]
    pub fn new(base_url: &str, chain_id: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
        }
    }

    #[must_use]
    pub fn from_app(config: &AppConfig) -> Self {
        let book = &config.order_book;
        let client = Self::new(&book.base_url, config.chain.chain_id)
            .with_timeout(Duration::from_millis(book.timeout_ms))
            .with_requests_per_minute(
                NonZeroU32::new(book.requests_per_minute).unwrap_or(DEFAULT_REQUESTS_PER_MINUTE),
            );
        match &book.api_key {
            Some(key) => client.with_api_key(key.clone()),
            None => client,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_requests_per_minute(mut self, rpm: NonZeroU32) -> Self {
        self.requests_per_minute = rpm;
        self
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

type GovernorLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Order book HTTP client. Cloning shares the rate limiter.
#[derive(Clone)]
pub struct OrderBookClient {
    http: Client,
    config: OrderBookClientConfig,
    limiter: Arc<GovernorLimiter>,
}

impl std::fmt::Debug for OrderBookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBookClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OrderBookClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OrderBookClientConfig) -> Result<Self, SubmissionError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(
            config.requests_per_minute,
        )));
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    #[must_use]
    pub fn config(&self) -> &OrderBookClientConfig {
        &self.config
    }

    fn root(&self) -> String {
        format!("{}/orderbook/v4.0/{}", self.config.base_url, self.config.chain_id)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, SubmissionError> {
        self.limiter.until_ready().await;
        self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                SubmissionError::Timeout(self.config.timeout)
            } else {
                SubmissionError::Http(e)
            }
        })
    }
}

#[async_trait]
impl OrderBook for OrderBookClient {
    async fn submit_order(
        &self,
        order: &LimitOrder,
        order_hash: H256,
        signature: &Signature,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let body = SubmitOrderRequest {
            order_hash: format!("{order_hash:?}"),
            signature: format!("0x{signature}"),
            data: order,
        };

        info!(
            order_hash = ?order_hash,
            maker = ?order.maker,
            making_amount = %order.making_amount,
            "Submitting order to order book"
        );

        let response = self.send(self.http.post(self.root()).json(&body)).await?;
        let status = response.status();
        let retry_after = parse_retry_after(&response);
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, retry_after, text));
        }

        let response = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| SubmissionError::Parse(format!("{e} - body: {text}")))?
        };
        info!(order_hash = ?order_hash, "Order accepted by order book");
        Ok(SubmissionReceipt {
            order_hash,
            attempts: 1,
            response,
        })
    }

    async fn get_order_by_hash(
        &self,
        order_hash: H256,
    ) -> Result<Option<OrderBookEntry>, SubmissionError> {
        let url = format!("{}/order/{order_hash:?}", self.root());
        debug!(order_hash = ?order_hash, "Fetching order from book");

        let response = self.send(self.http.get(&url)).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let retry_after = parse_retry_after(&response);
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_failure(status, retry_after, text));
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| SubmissionError::Parse(format!("order {order_hash:?}: {e}")))
    }

    async fn get_orders_by_maker(
        &self,
        maker: Address,
        filter: &MakerOrdersFilter,
    ) -> Result<Vec<OrderBookEntry>, SubmissionError> {
        let url = format!("{}/address/{maker:?}", self.root());
        let statuses = filter
            .statuses
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let request = self.http.get(&url).query(&[
            ("page", filter.page.to_string()),
            ("limit", filter.limit.to_string()),
            ("statuses", statuses),
        ]);

        let response = self.send(request).await?;
        let status = response.status();
        let retry_after = parse_retry_after(&response);
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_failure(status, retry_after, text));
        }
        let entries: Vec<OrderBookEntry> = serde_json::from_str(&text)
            .map_err(|e| SubmissionError::Parse(format!("orders of {maker:?}: {e}")))?;
        debug!(maker = ?maker, count = entries.len(), "Fetched maker orders");
        Ok(entries)
    }
}

/// `Retry-After` in whole seconds.
fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn classify_failure(status: StatusCode, retry_after: Option<Duration>, body: String) -> SubmissionError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return SubmissionError::RateLimited { retry_after };
    }
    if status.is_client_error() {
        if body.to_ascii_lowercase().contains("allowance") {
            return SubmissionError::Allowance(body);
        }
        return SubmissionError::Reverted {
            status: status.as_u16(),
            message: body,
        };
    }
    SubmissionError::Server {
        status: status.as_u16(),
        message: body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maker_traits::MakerTraits;
    use ethers::types::Bytes;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::str::FromStr;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> LimitOrder {
        LimitOrder {
            salt: U256::from(12345),
            maker: Address::repeat_byte(0xaa),
            receiver: Address::zero(),
            maker_asset: Address::repeat_byte(0x01),
            taker_asset: Address::repeat_byte(0x02),
            making_amount: U256::from(100_000u64),
            taking_amount: U256::from(30_000_000_000_000u64),
            maker_traits: MakerTraits::new().with_expiration(2_000_000_000),
            extension: Bytes::new(),
        }
    }

    fn signature() -> Signature {
        Signature::from_str(&format!("{}{}1b", "11".repeat(32), "22".repeat(32))).unwrap()
    }

    fn client(server: &MockServer) -> OrderBookClient {
        let config = OrderBookClientConfig::new(&server.uri(), 8453)
            .with_api_key(SecretString::from("test-key".to_string()))
            .with_timeout(Duration::from_secs(2))
            .with_requests_per_minute(nonzero!(6000u32));
        OrderBookClient::new(config).unwrap()
    }

    fn entry_json(remaining: &str, reason: Value) -> Value {
        serde_json::json!({
            "orderHash": format!("0x{}", "ab".repeat(32)),
            "signature": "0x00",
            "createDateTime": "2024-01-01T00:00:00Z",
            "remainingMakerAmount": remaining,
            "status": 1,
            "orderInvalidReason": reason,
            "data": serde_json::to_value(order()).unwrap(),
        })
    }

    // =========================================================================
    // Error Classification
    // =========================================================================

    #[test]
    fn test_error_is_retryable() {
        assert!(SubmissionError::Allowance("x".into()).is_retryable());
        assert!(SubmissionError::RateLimited { retry_after: None }.is_retryable());
        assert!(SubmissionError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(SubmissionError::Server { status: 503, message: String::new() }.is_retryable());
        assert!(!SubmissionError::Reverted { status: 400, message: String::new() }.is_retryable());
    }

    #[test]
    fn test_classify_failure() {
        let e = classify_failure(StatusCode::BAD_REQUEST, None, "not enough allowance".into());
        assert_eq!(e.code(), ErrorCode::SubmissionAllowance);

        let e = classify_failure(StatusCode::BAD_REQUEST, None, "invalid signature".into());
        assert_eq!(e.code(), ErrorCode::SubmissionReverted);

        let e = classify_failure(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(3)), String::new());
        assert_eq!(e.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(e.code(), ErrorCode::SubmissionRateLimited);

        let e = classify_failure(StatusCode::BAD_GATEWAY, None, String::new());
        assert_eq!(e.code(), ErrorCode::SubmissionUnknown);
    }

    // =========================================================================
    // Observed State
    // =========================================================================

    #[test]
    fn test_observed_state() {
        let parse = |v: Value| serde_json::from_value::<OrderBookEntry>(v).unwrap();

        assert_eq!(parse(entry_json("0", Value::Null)).observed_state(0), OrderState::Filled);
        assert_eq!(
            parse(entry_json("10", serde_json::json!(["order cancelled by maker"]))).observed_state(0),
            OrderState::Cancelled
        );
        assert_eq!(
            parse(entry_json("10", Value::Null)).observed_state(2_000_000_000),
            OrderState::Expired
        );
        assert_eq!(parse(entry_json("10", Value::Null)).observed_state(0), OrderState::Active);
    }

    // =========================================================================
    // HTTP Client
    // =========================================================================

    #[tokio::test]
    async fn test_submit_order_posts_signed_payload() {
        let server = MockServer::start().await;
        let hash = H256::repeat_byte(0xab);

        Mock::given(method("POST"))
            .and(path("/orderbook/v4.0/8453"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "orderHash": format!("{hash:?}"),
                "data": { "salt": "12345", "makingAmount": "100000" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = client(&server)
            .submit_order(&order(), hash, &signature())
            .await
            .unwrap();
        assert_eq!(receipt.order_hash, hash);
        assert_eq!(receipt.response["success"], true);
    }

    #[tokio::test]
    async fn test_submit_order_rate_limited_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let err = client(&server)
            .submit_order(&order(), H256::zero(), &signature())
            .await
            .unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_get_order_by_hash() {
        let server = MockServer::start().await;
        let hash = H256::repeat_byte(0xab);
        Mock::given(method("GET"))
            .and(path(format!("/orderbook/v4.0/8453/order/{hash:?}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(entry_json("100000", Value::Null)))
            .mount(&server)
            .await;

        let entry = client(&server).get_order_by_hash(hash).await.unwrap().unwrap();
        assert_eq!(entry.order_hash, hash);
        assert_eq!(entry.data, order());
        assert_eq!(entry.remaining_maker_amount(), Some(U256::from(100_000u64)));
    }

    #[tokio::test]
    async fn test_get_order_by_hash_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(client(&server)
            .get_order_by_hash(H256::zero())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_orders_by_maker_sends_filter() {
        let server = MockServer::start().await;
        let maker = Address::repeat_byte(0xaa);
        Mock::given(method("GET"))
            .and(path(format!("/orderbook/v4.0/8453/address/{maker:?}")))
            .and(query_param("statuses", "1"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([entry_json("5", Value::Null)])),
            )
            .mount(&server)
            .await;

        let filter = MakerOrdersFilter::active().with_page(Some(2), Some(10_000));
        assert_eq!(filter.limit, 500);
        let entries = client(&server).get_orders_by_maker(maker, &filter).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn app_config_maps_onto_client_config() {
        let mut app = AppConfig::default();
        app.order_book.requests_per_minute = 0;
        app.order_book.timeout_ms = 1_500;
        app.order_book.api_key = Some(SecretString::from("book-key".to_string()));

        let config = OrderBookClientConfig::from_app(&app);
        assert_eq!(config.requests_per_minute, DEFAULT_REQUESTS_PER_MINUTE);
        assert_eq!(config.timeout, Duration::from_millis(1_500));
        assert_eq!(config.api_key.as_ref().unwrap().expose_secret(), "book-key");
        assert_eq!(config.chain_id, app.chain.chain_id);
    }

    #[tokio::test]
    async fn requests_beyond_quota_wait_for_the_limiter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;
        let config = OrderBookClientConfig::new(&server.uri(), 8453)
            .with_requests_per_minute(nonzero!(2u32));
        let client = OrderBookClient::new(config).unwrap();

        for _ in 0..2 {
            assert!(client.get_order_by_hash(H256::zero()).await.unwrap().is_none());
        }
        let third = tokio::time::timeout(
            Duration::from_millis(300),
            client.get_order_by_hash(H256::zero()),
        )
        .await;
        assert!(third.is_err(), "third request should be held by the rate limiter");
    }

    // =========================================================================
    // Retry Loop
    // =========================================================================

    struct ScriptedBook {
        outcomes: Mutex<VecDeque<Result<(), SubmissionError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedBook {
        fn new(outcomes: Vec<Result<(), SubmissionError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl OrderBook for ScriptedBook {
        async fn submit_order(
            &self,
            _order: &LimitOrder,
            order_hash: H256,
            _signature: &Signature,
        ) -> Result<SubmissionReceipt, SubmissionError> {
            *self.calls.lock() += 1;
            let next = self.outcomes.lock().pop_front().unwrap_or(Ok(()));
            next.map(|()| SubmissionReceipt {
                order_hash,
                attempts: 1,
                response: Value::Null,
            })
        }

        async fn get_order_by_hash(&self, _: H256) -> Result<Option<OrderBookEntry>, SubmissionError> {
            Ok(None)
        }

        async fn get_orders_by_maker(
            &self,
            _: Address,
            _: &MakerOrdersFilter,
        ) -> Result<Vec<OrderBookEntry>, SubmissionError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let book = ScriptedBook::new(vec![
            Err(SubmissionError::Timeout(Duration::from_secs(1))),
            Err(SubmissionError::Allowance("allowance".into())),
            Ok(()),
        ]);
        let receipt = submit_with_retry(&book, &BackoffPolicy::immediate(3), &order(), H256::zero(), &signature())
            .await
            .unwrap();
        assert_eq!(receipt.attempts, 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_revert() {
        let book = ScriptedBook::new(vec![Err(SubmissionError::Reverted {
            status: 400,
            message: "bad order".into(),
        })]);
        let err = submit_with_retry(&book, &BackoffPolicy::immediate(3), &order(), H256::zero(), &signature())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SubmissionReverted);
        assert_eq!(*book.calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let book = ScriptedBook::new(
            (0..5)
                .map(|_| Err(SubmissionError::Server { status: 503, message: String::new() }))
                .collect(),
        );
        let err = submit_with_retry(&book, &BackoffPolicy::immediate(3), &order(), H256::zero(), &signature())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SubmissionUnknown);
        assert_eq!(*book.calls.lock(), 3);
    }
}
