//! Order pipeline service.
//!
//! Orchestrates the two-phase flow:
//!
//! 1. `prepare`: build an unsigned conditional order, stash it in the pending
//!    store, and hand back the typed data the maker signs.
//! 2. `submit`: consume the pending order exactly once, check the signature,
//!    and post it to the order book with bounded retries.
//!
//! Read-side queries (active orders, history, details, cancellation checks)
//! go straight to the order book.

use crate::approvals::{read_allowance, ApprovalHint};
use crate::builder::{OrderBuilder, OrderDraft};
use crate::cancel::{authorize_cancel, check_cancel, CancelTransaction};
use crate::error::OrderError;
use crate::monitor::{ConditionMonitor, TrackedOrder};
use crate::order_book::{submit_with_retry, MakerOrdersFilter, OrderBook, OrderBookEntry};
use crate::pending::PendingOrderStore;
use crate::predicate::Comparison;
use crate::retry::BackoffPolicy;
use crate::signature::{parse_address, parse_hash, parse_signature, verify_maker};
use crate::tokens::format_amount;
use crate::types::{
    CanCancelResponse, CancelRequest, CancelResponse, ConditionView, ErrorBody, NormalizedOrder,
    OrderDetailsResponse, OrderSummary, OrdersResponse, PageQuery, PrepareRequest, PrepareResponse,
    SignedOrder, SigningData, SubmissionView, SubmitRequest, SubmitResponse, TechnicalDetails,
    ValidateResponse,
};
use condswap_core::{Condition, ErrorCode, HasErrorCode, Operator, OrderState};
use condswap_oracle::{Index, JsonRpcClient, OracleReader, PredefinedIndex};
use ethers::types::{Address, H256, U256};
use std::sync::Arc;
use tracing::{info, warn};

fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

pub struct OrderPipeline {
    builder: OrderBuilder,
    pending: Arc<dyn PendingOrderStore>,
    book: Arc<dyn OrderBook>,
    monitor: Arc<ConditionMonitor>,
    allowance_rpc: Option<JsonRpcClient>,
    retry: BackoffPolicy,
    verify_signatures: bool,
}

impl OrderPipeline {
    #[must_use]
    pub fn new(
        builder: OrderBuilder,
        pending: Arc<dyn PendingOrderStore>,
        book: Arc<dyn OrderBook>,
        monitor: Arc<ConditionMonitor>,
    ) -> Self {
        Self {
            builder,
            pending,
            book,
            monitor,
            allowance_rpc: None,
            retry: BackoffPolicy::default(),
            verify_signatures: true,
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: BackoffPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_signature_verification(mut self, enabled: bool) -> Self {
        self.verify_signatures = enabled;
        self
    }

    /// Enables best-effort allowance reads during prepare.
    #[must_use]
    pub fn with_allowance_reader(mut self, rpc: JsonRpcClient) -> Self {
        self.allowance_rpc = Some(rpc);
        self
    }

    #[must_use]
    pub fn oracle(&self) -> &Arc<dyn OracleReader> {
        self.builder.oracle()
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<ConditionMonitor> {
        &self.monitor
    }

    #[must_use]
    pub fn pending(&self) -> &Arc<dyn PendingOrderStore> {
        &self.pending
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.builder.domain().chain_id
    }

    fn protocol(&self) -> Address {
        self.builder.domain().verifying_contract
    }

    // =========================================================================
    // Prepare / Submit
    // =========================================================================

    fn draft_from(req: &PrepareRequest) -> Result<OrderDraft, OrderError> {
        let operator = req
            .condition
            .operator
            .parse::<Operator>()
            .map_err(|e| OrderError::Validation(e.to_string()))?;
        let receiver = req
            .receiver
            .as_deref()
            .map(|r| parse_address("receiver", r))
            .transpose()?;

        Ok(OrderDraft {
            from_token: req.from_token.clone(),
            to_token: req.to_token.clone(),
            amount: req.amount.clone(),
            expected_amount: req.expected_amount.clone(),
            condition: Condition::new(req.condition.index_id, operator, req.condition.threshold),
            expiration_hours: req.expiration_hours,
            maker: parse_address("makerAddress", &req.maker_address)?,
            receiver,
            allow_partial_fills: req.allow_partial_fills.unwrap_or(true),
            allow_multiple_fills: req.allow_multiple_fills.unwrap_or(true),
        })
    }

    /// Builds an unsigned order and stores it for one later `submit`.
    ///
    /// # Errors
    ///
    /// `Validation`, `UnknownAsset`, `InvalidAmount`, `UnknownIndex`, or
    /// `OracleUnavailable` when the index cannot be checked.
    pub async fn prepare(&self, req: &PrepareRequest) -> Result<PrepareResponse, OrderError> {
        let draft = Self::draft_from(req)?;
        let built = self.builder.build(&draft).await?;
        let condition = built.condition;
        let now = now_secs();

        let reading = self.oracle().get_value(condition.index_id).await;
        if let Err(e) = &reading {
            warn!(index_id = condition.index_id, error = %e, "Could not read index for prepare preview");
        }
        let reading = reading.ok();

        let allowance = self.read_maker_allowance(&built.order.maker, built.maker_token.address).await;
        let approval = allowance
            .filter(|a| *a < built.order.making_amount)
            .map(|_| {
                ApprovalHint::unlimited(built.maker_token.address, &built.maker_token.symbol, self.protocol())
            });

        let ticket = self
            .pending
            .put(built.order.clone(), built.order_hash, condition, now)
            .await;

        info!(
            order_id = %ticket.id,
            order_hash = ?built.order_hash,
            maker = ?built.order.maker,
            condition = %condition,
            "Prepared conditional order"
        );

        Ok(PrepareResponse {
            success: true,
            order_hash: built.order_hash,
            order_id: ticket.id.clone(),
            condition: ConditionView {
                condition,
                index_name: PredefinedIndex::from_id(condition.index_id).map(|p| p.name().to_string()),
                current_value: reading.as_ref().map(|r| r.value),
                currently_met: reading.as_ref().map(|r| condition.evaluate(r.value)),
            },
            signing_data: SigningData {
                typed_data: built.typed_data,
                order_hash: built.order_hash,
                order_id: ticket.id,
            },
            technical: TechnicalDetails {
                predicate: built.predicate,
                encoded_comparison: Comparison::from(condition.operator),
                extension: built.order.extension.clone(),
                maker_traits_hex: built.order.maker_traits.to_hex(),
                nonce: built.order.nonce(),
                expiration: built.order.expiration(),
                chain_id: self.chain_id(),
                protocol_address: self.protocol(),
                oracle_address: self.oracle().contract_address(),
                maker_token: built.maker_token.symbol.clone(),
                taker_token: built.taker_token.symbol.clone(),
                making_amount_display: format_amount(built.order.making_amount, built.maker_token.decimals),
                taking_amount_display: format_amount(built.order.taking_amount, built.taker_token.decimals),
                allowance,
                approval,
                pending_expires_at: ticket.expires_at,
            },
            order: built.order,
        })
    }

    async fn read_maker_allowance(&self, maker: &Address, token: Address) -> Option<U256> {
        let rpc = self.allowance_rpc.as_ref()?;
        match read_allowance(rpc, token, *maker, self.protocol()).await {
            Ok(allowance) => Some(allowance),
            Err(e) => {
                warn!(token = ?token, maker = ?maker, error = %e, "Allowance read failed");
                None
            }
        }
    }

    /// Consumes the pending order, checks the signature, and submits it.
    ///
    /// A malformed signature is rejected before the pending order is touched.
    /// Once taken, the order is gone whether or not the book accepts it; the
    /// signed artifact comes back in the response for out-of-band resubmission.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, a hash mismatch or a foreign signer;
    /// `OrderNotFound` for an unknown, consumed or expired id. Order-book
    /// failures are reported inside the response, not as errors.
    pub async fn submit(&self, req: &SubmitRequest) -> Result<SubmitResponse, OrderError> {
        let signature = parse_signature(&req.signature)?;
        let claimed_hash = req.order_data.order_hash.as_deref().map(parse_hash).transpose()?;

        let pending = self
            .pending
            .take(&req.order_data.order_id, now_secs())
            .await?;

        if let Some(claimed) = claimed_hash {
            if claimed != pending.order_hash {
                return Err(OrderError::Validation(format!(
                    "orderHash {claimed:?} does not match prepared order {:?}",
                    pending.order_hash
                )));
            }
        }
        if self.verify_signatures {
            verify_maker(pending.order_hash, &signature, pending.order.maker)?;
        }

        let outcome = submit_with_retry(
            self.book.as_ref(),
            &self.retry,
            &pending.order,
            pending.order_hash,
            &signature,
        )
        .await;

        let submission = match outcome {
            Ok(receipt) => {
                info!(
                    order_id = %pending.id,
                    order_hash = ?pending.order_hash,
                    attempts = receipt.attempts,
                    "Order submitted"
                );
                self.monitor.track(TrackedOrder {
                    order_hash: pending.order_hash,
                    maker: pending.order.maker,
                    condition: pending.condition,
                    expiration: pending.order.expiration(),
                    state: OrderState::Submitted,
                });
                SubmissionView {
                    submitted: true,
                    result: Some(receipt),
                    error: None,
                    approval: None,
                }
            }
            Err(e) => {
                warn!(
                    order_id = %pending.id,
                    order_hash = ?pending.order_hash,
                    code = %e.code(),
                    error = %e,
                    "Order created but not submitted"
                );
                let approval = (e.code() == ErrorCode::SubmissionAllowance).then(|| {
                    let symbol = self
                        .builder
                        .tokens()
                        .by_address(&pending.order.maker_asset)
                        .map_or_else(|| format!("{:?}", pending.order.maker_asset), |t| t.symbol.clone());
                    ApprovalHint::unlimited(pending.order.maker_asset, &symbol, self.protocol())
                });
                SubmissionView {
                    submitted: false,
                    result: None,
                    error: Some(ErrorBody::from_error(&e)),
                    approval,
                }
            }
        };

        Ok(SubmitResponse {
            success: true,
            order_hash: pending.order_hash,
            order_id: pending.id,
            submission,
            signed_order: SignedOrder {
                order: pending.order,
                signature: format!("0x{signature}"),
            },
        })
    }

    /// Shape check of a prepare request. No oracle reads, no store writes.
    #[must_use]
    pub fn validate(&self, req: &PrepareRequest) -> ValidateResponse {
        let checked = Self::draft_from(req).and_then(|draft| {
            let resolved = self.builder.resolve(&draft)?;
            Ok(NormalizedOrder {
                maker_asset: resolved.maker_token.address,
                taker_asset: resolved.taker_token.address,
                making_amount: resolved.making_amount,
                taking_amount: resolved.taking_amount,
                condition: draft.condition,
            })
        });
        match checked {
            Ok(normalized) => ValidateResponse {
                valid: true,
                error: None,
                normalized: Some(normalized),
            },
            Err(e) => ValidateResponse {
                valid: false,
                error: Some(ErrorBody::from_error(&e)),
                normalized: None,
            },
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn summarize(entry: &OrderBookEntry, now: u64) -> OrderSummary {
        OrderSummary {
            order_hash: entry.order_hash,
            state: entry.observed_state(now),
            maker: entry.data.maker,
            maker_asset: entry.data.maker_asset,
            taker_asset: entry.data.taker_asset,
            making_amount: entry.data.making_amount,
            taking_amount: entry.data.taking_amount,
            remaining_maker_amount: entry.remaining_maker_amount.clone(),
            expiration: entry.data.expiration(),
            created_at: entry.create_date_time.clone(),
            predicate: entry.data.predicate(),
        }
    }

    async fn maker_orders(
        &self,
        maker: &str,
        filter: &MakerOrdersFilter,
        keep: impl Fn(OrderState) -> bool,
    ) -> Result<OrdersResponse, OrderError> {
        let maker = parse_address("maker", maker)?;
        let now = now_secs();
        let orders: Vec<_> = self
            .book
            .get_orders_by_maker(maker, filter)
            .await?
            .iter()
            .map(|entry| Self::summarize(entry, now))
            .filter(|summary| keep(summary.state))
            .collect();
        Ok(OrdersResponse {
            maker,
            count: orders.len(),
            orders,
        })
    }

    /// Orders of `maker` the book still considers fillable.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed address; submission errors from the book.
    pub async fn active_orders(&self, maker: &str, page: PageQuery) -> Result<OrdersResponse, OrderError> {
        let filter = MakerOrdersFilter::active().with_page(page.page, page.limit);
        self.maker_orders(maker, &filter, |s| s == OrderState::Active)
            .await
    }

    /// Every order of `maker` the book knows, in any state.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed address; submission errors from the book.
    pub async fn order_history(&self, maker: &str, page: PageQuery) -> Result<OrdersResponse, OrderError> {
        let filter = MakerOrdersFilter::default().with_page(page.page, page.limit);
        self.maker_orders(maker, &filter, |_| true).await
    }

    async fn book_entry(&self, order_hash: &str) -> Result<(H256, Option<OrderBookEntry>), OrderError> {
        let hash = parse_hash(order_hash)?;
        Ok((hash, self.book.get_order_by_hash(hash).await?))
    }

    /// # Errors
    ///
    /// `OrderNotFound` when the book does not know the hash.
    pub async fn order_details(&self, order_hash: &str) -> Result<OrderDetailsResponse, OrderError> {
        let (hash, entry) = self.book_entry(order_hash).await?;
        let entry = entry.ok_or_else(|| OrderError::OrderNotFound(format!("{hash:?}")))?;
        Ok(OrderDetailsResponse {
            summary: Self::summarize(&entry, now_secs()),
            signature: entry.signature.clone(),
            invalid_reason: entry.invalid_reason(),
            monitor: self.monitor.report_for(&hash),
            order: entry.data,
        })
    }

    /// # Errors
    ///
    /// `Validation` for malformed input; submission errors from the book.
    pub async fn can_cancel(&self, req: &CancelRequest) -> Result<CanCancelResponse, OrderError> {
        let caller = parse_address("makerAddress", &req.maker_address)?;
        let (hash, entry) = self.book_entry(&req.order_hash).await?;
        Ok(CanCancelResponse {
            order_hash: hash,
            check: check_cancel(entry.as_ref(), caller, now_secs()),
        })
    }

    /// Returns the unsigned `cancelOrder` transaction for the maker.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `Unauthorized` for non-makers, `Validation` when the
    /// order is no longer active.
    pub async fn cancel(&self, req: &CancelRequest) -> Result<CancelResponse, OrderError> {
        let caller = parse_address("makerAddress", &req.maker_address)?;
        let (hash, entry) = self.book_entry(&req.order_hash).await?;
        let entry = entry.ok_or_else(|| OrderError::OrderNotFound(format!("{hash:?}")))?;

        authorize_cancel(&entry, caller)?;
        let state = entry.observed_state(now_secs());
        if state != OrderState::Active {
            return Err(OrderError::Validation(format!("order {hash:?} is {state}")));
        }

        info!(order_hash = ?hash, maker = ?caller, "Prepared cancellation");
        Ok(CancelResponse {
            success: true,
            order_hash: hash,
            transaction: CancelTransaction::new(
                self.protocol(),
                self.chain_id(),
                entry.data.maker_traits,
                hash,
            ),
        })
    }

    // =========================================================================
    // Oracle
    // =========================================================================

    /// # Errors
    ///
    /// Oracle read failures.
    pub async fn list_indices(&self) -> Result<Vec<Index>, OrderError> {
        Ok(self.oracle().list_indices().await?)
    }

    /// # Errors
    ///
    /// `UnknownIndex` or oracle read failures.
    pub async fn get_index(&self, index_id: u64) -> Result<Index, OrderError> {
        Ok(self.oracle().get_index(index_id).await?)
    }
}
