//! Runs the HTTP API together with the condition monitor and the pending-store sweeper.

use super::ConfigArgs;
use crate::wiring::build_pipeline;
use anyhow::Result;
use clap::Args;
use condswap_orders::spawn_sweeper;
use condswap_web_api::ApiServer;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Override the configured bind address (host:port)
    #[arg(short, long)]
    pub addr: Option<String>,

    /// Do not start the condition monitor
    #[arg(long)]
    pub no_monitor: bool,
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = args.config.load()?;
    let addr = args.addr.unwrap_or_else(|| config.bind_addr());

    tracing::info!(
        chain_id = config.chain.chain_id,
        oracle_backend = ?config.oracle.backend,
        protocol = ?config.protocol.address,
        order_book = %config.order_book.base_url,
        "Starting conditional order service"
    );

    let pipeline = Arc::new(build_pipeline(&config)?);

    let sweeper = spawn_sweeper(
        pipeline.pending().clone(),
        Duration::from_secs(config.pending.sweep_interval_secs.max(1)),
    );
    let monitor = (!args.no_monitor).then(|| {
        pipeline
            .monitor()
            .clone()
            .spawn(Duration::from_secs(config.monitor.interval_secs.max(1)))
    });

    let server = ApiServer::new(pipeline);
    let result = tokio::select! {
        result = server.serve(&addr) => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    sweeper.abort();
    if let Some(monitor) = monitor {
        monitor.abort();
    }
    tracing::info!("Shutdown complete");

    result
}
