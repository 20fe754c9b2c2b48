//! Builds the service graph from a resolved [`AppConfig`].

use anyhow::{Context, Result};
use condswap_core::{AppConfig, OracleBackend};
use condswap_oracle::{IndexRegistry, JsonRpcClient, OracleReader, RpcFeed, RpcOracle};
use condswap_orders::{
    BackoffPolicy, ConditionMonitor, Eip712Domain, InMemoryPendingStore, OrderBook,
    OrderBookClient, OrderBookClientConfig, OrderBuilder, OrderPipeline, TokenRegistry,
};
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;

pub fn rpc_client(config: &AppConfig) -> Result<JsonRpcClient> {
    JsonRpcClient::new(
        config.chain.rpc_url.clone(),
        Duration::from_millis(config.chain.rpc_timeout_ms),
    )
    .context("failed to build JSON-RPC client")
}

/// The local backend is a registry with no administrator; push feeds are read over RPC.
pub fn build_oracle(config: &AppConfig) -> Result<Arc<dyn OracleReader>> {
    let rpc = rpc_client(config)?;
    let oracle: Arc<dyn OracleReader> = match config.oracle.backend {
        OracleBackend::Rpc => Arc::new(RpcOracle::new(
            rpc,
            config.oracle.contract_address,
            Duration::from_millis(config.oracle.read_timeout_ms),
        )),
        OracleBackend::Local => Arc::new(IndexRegistry::new(
            Address::zero(),
            config.oracle.contract_address,
            Arc::new(RpcFeed::new(rpc)),
        )),
    };
    Ok(oracle)
}

pub fn build_pipeline(config: &AppConfig) -> Result<OrderPipeline> {
    let oracle = build_oracle(config)?;
    let builder = OrderBuilder::new(
        Eip712Domain::from_config(&config.protocol, config.chain.chain_id),
        TokenRegistry::new(&config.tokens),
        oracle.clone(),
    );
    let book: Arc<dyn OrderBook> = Arc::new(
        OrderBookClient::new(OrderBookClientConfig::from_app(config))
            .context("failed to build order-book client")?,
    );
    let monitor = Arc::new(
        ConditionMonitor::new(
            oracle,
            book.clone(),
            Duration::from_millis(config.monitor.call_timeout_ms),
        )
        .with_report_retention(Duration::from_secs(config.monitor.report_retention_secs)),
    );
    let pending = Arc::new(InMemoryPendingStore::new(Duration::from_secs(
        config.pending.ttl_secs,
    )));

    Ok(OrderPipeline::new(builder, pending, book, monitor)
        .with_retry_policy(BackoffPolicy::from(&config.retry))
        .with_signature_verification(config.verify_signatures)
        .with_allowance_reader(rpc_client(config)?))
}
