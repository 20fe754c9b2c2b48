use crate::error::ApiError;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use condswap_oracle::Index;
use condswap_orders::types::{
    CanCancelResponse, CancelRequest, CancelResponse, OrderDetailsResponse, OrdersResponse,
    PageQuery, PrepareRequest, PrepareResponse, SubmitRequest, SubmitResponse, ValidateResponse,
};
use condswap_orders::{MonitorReport, OrderPipeline};
use serde::Serialize;
use std::sync::Arc;

type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// Orders
// =============================================================================

/// Builds an unsigned conditional order and returns the data to sign.
///
/// # Errors
/// `400` for malformed or unresolvable input, `502` when the oracle is unreachable.
pub async fn prepare_order(
    State(pipeline): State<Arc<OrderPipeline>>,
    payload: Result<Json<PrepareRequest>, JsonRejection>,
) -> ApiResult<PrepareResponse> {
    let Json(req) = payload?;
    Ok(Json(pipeline.prepare(&req).await?))
}

/// Submits a signed, previously prepared order.
///
/// # Errors
/// `400` for a malformed signature or hash mismatch, `404` for an unknown order id.
pub async fn submit_order(
    State(pipeline): State<Arc<OrderPipeline>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<SubmitResponse> {
    let Json(req) = payload?;
    Ok(Json(pipeline.submit(&req).await?))
}

/// Shape check only. Always `200`; the verdict is in the body.
///
/// # Errors
/// `400` when the body is not a prepare request at all.
pub async fn validate_order(
    State(pipeline): State<Arc<OrderPipeline>>,
    payload: Result<Json<PrepareRequest>, JsonRejection>,
) -> ApiResult<ValidateResponse> {
    let Json(req) = payload?;
    Ok(Json(pipeline.validate(&req)))
}

/// # Errors
/// `400` for a malformed address, `502` when the order book fails.
pub async fn active_orders(
    State(pipeline): State<Arc<OrderPipeline>>,
    Path(maker): Path<String>,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<OrdersResponse> {
    let Query(page) = page?;
    Ok(Json(pipeline.active_orders(&maker, page).await?))
}

/// # Errors
/// `400` for a malformed address, `502` when the order book fails.
pub async fn order_history(
    State(pipeline): State<Arc<OrderPipeline>>,
    Path(maker): Path<String>,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<OrdersResponse> {
    let Query(page) = page?;
    Ok(Json(pipeline.order_history(&maker, page).await?))
}

/// # Errors
/// `400` for a malformed hash, `404` when the book does not know it.
pub async fn order_details(
    State(pipeline): State<Arc<OrderPipeline>>,
    Path(order_hash): Path<String>,
) -> ApiResult<OrderDetailsResponse> {
    Ok(Json(pipeline.order_details(&order_hash).await?))
}

/// # Errors
/// `400` for malformed input, `502` when the order book fails.
pub async fn can_cancel(
    State(pipeline): State<Arc<OrderPipeline>>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> ApiResult<CanCancelResponse> {
    let Json(req) = payload?;
    Ok(Json(pipeline.can_cancel(&req).await?))
}

/// # Errors
/// `403` for non-makers, `404` for unknown orders, `400` when no longer active.
pub async fn cancel_order(
    State(pipeline): State<Arc<OrderPipeline>>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> ApiResult<CancelResponse> {
    let Json(req) = payload?;
    Ok(Json(pipeline.cancel(&req).await?))
}

// =============================================================================
// Oracle / Monitor / Health
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicesResponse {
    pub count: usize,
    pub indices: Vec<Index>,
}

/// # Errors
/// `502` when the oracle is unreachable.
pub async fn list_indices(State(pipeline): State<Arc<OrderPipeline>>) -> ApiResult<IndicesResponse> {
    let indices = pipeline.list_indices().await?;
    Ok(Json(IndicesResponse {
        count: indices.len(),
        indices,
    }))
}

/// # Errors
/// `400` for a non-numeric or unknown id, `502` when the oracle is unreachable.
pub async fn get_index(
    State(pipeline): State<Arc<OrderPipeline>>,
    index_id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Index> {
    let Path(index_id) = index_id?;
    Ok(Json(pipeline.get_index(index_id).await?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorResponse {
    pub tracked: usize,
    pub reports: Vec<MonitorReport>,
}

pub async fn monitor_orders(State(pipeline): State<Arc<OrderPipeline>>) -> Json<MonitorResponse> {
    let monitor = pipeline.monitor();
    Json(MonitorResponse {
        tracked: monitor.tracked_count(),
        reports: monitor.snapshot(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub chain_id: u64,
    pub oracle_address: String,
    pub pending_orders: usize,
    pub tracked_orders: usize,
    pub timestamp: String,
}

pub async fn health(State(pipeline): State<Arc<OrderPipeline>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        chain_id: pipeline.chain_id(),
        oracle_address: format!("{:?}", pipeline.oracle().contract_address()),
        pending_orders: pipeline.pending().len().await,
        tracked_orders: pipeline.monitor().tracked_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
