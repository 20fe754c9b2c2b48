use crate::{handlers, websocket};
use axum::{
    routing::{get, post},
    Router,
};
use condswap_orders::OrderPipeline;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    pipeline: Arc<OrderPipeline>,
}

impl ApiServer {
    #[must_use]
    pub const fn new(pipeline: Arc<OrderPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/orders/prepare", post(handlers::prepare_order))
            .route("/orders/submit", post(handlers::submit_order))
            .route("/orders/validate", post(handlers::validate_order))
            .route("/orders/active/:maker", get(handlers::active_orders))
            .route("/orders/history/:maker", get(handlers::order_history))
            .route("/orders/details/:order_hash", get(handlers::order_details))
            .route("/orders/can-cancel", post(handlers::can_cancel))
            .route("/orders/cancel", post(handlers::cancel_order))
            .route("/oracle/indices", get(handlers::list_indices))
            .route("/oracle/indices/:index_id", get(handlers::get_index))
            .route("/monitor/orders", get(handlers::monitor_orders))
            .route("/ws/monitor", get(websocket::monitor_stream_handler))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.pipeline.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr, "Web API listening");

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
