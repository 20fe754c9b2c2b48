use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use condswap_orders::OrderPipeline;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub async fn monitor_stream_handler(
    ws: WebSocketUpgrade,
    State(pipeline): State<Arc<OrderPipeline>>,
) -> Response {
    ws.on_upgrade(|socket| monitor_stream(socket, pipeline))
}

/// Pushes each monitor report as a JSON text frame until the client leaves.
async fn monitor_stream(mut socket: WebSocket, pipeline: Arc<OrderPipeline>) {
    let mut reports = pipeline.monitor().subscribe();

    loop {
        tokio::select! {
            report = reports.recv() => {
                match report {
                    Ok(report) => {
                        let json = serde_json::to_string(&report).unwrap_or_default();
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Monitor stream client lagging, reports dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!("Monitor stream closed");
}
