//! Parkwatch Gate Node — the edge process at one entry/exit.
//!
//! Serves the local-first API for the gate UI, keeps the local snapshot and
//! the durable offline queue, and runs the reconciliation workers plus the
//! realtime WebSocket client.

use std::sync::Arc;

use tracing::{error, info};

use parkwatch::gate::reconciler::{start_queue_drainer, start_snapshot_puller};
use parkwatch::gate::{create_gate_router, start_ws_client, CloudClient, GateLocalStore, GateState};
use parkwatch::infrastructure::images::ImageStore;
use parkwatch::support::shutdown::ShutdownCoordinator;
use parkwatch::GateConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = GateConfig::load();
    info!(
        gate_id = cfg.gate_id.as_str(),
        cloud_api = cfg.cloud_api.as_str(),
        "Starting Parkwatch Gate Node..."
    );

    // ── Local store & image storage ────────────────────────────
    tokio::fs::create_dir_all(&cfg.data_dir).await?;

    let db_path = cfg.local_db_path();
    let store = match GateLocalStore::open(&db_path.to_string_lossy()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open local store: {}", e);
            return Err(e.into());
        }
    };

    let images = ImageStore::new(cfg.local_image_dir());
    images.ensure_dirs().await?;

    let client = Arc::new(CloudClient::new(
        cfg.cloud_api.as_str(),
        cfg.secret_token.as_str(),
    ));

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = ShutdownCoordinator::new();
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    // ── Realtime channel + reconciliation workers ──────────────
    let (ws, ws_task) = start_ws_client(
        &cfg.cloud_api,
        &cfg.gate_id,
        store.clone(),
        shutdown_signal.clone(),
    );
    shutdown.register("ws-client", ws_task);
    shutdown.register(
        "snapshot-puller",
        start_snapshot_puller(store.clone(), client.clone(), shutdown_signal.clone()),
    );
    shutdown.register(
        "queue-drainer",
        start_queue_drainer(store.clone(), client.clone(), shutdown_signal.clone()),
    );

    // ── Local API server ───────────────────────────────────────
    let state = GateState {
        gate_id: cfg.gate_id.clone(),
        store,
        client,
        images,
        ws,
    };
    let router = create_gate_router(state);

    let addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gate local API listening on http://{}", addr);

    let serve_shutdown = shutdown_signal.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            serve_shutdown.wait().await;
            info!("Gate local API received shutdown signal");
        })
        .await?;

    shutdown.drain(std::time::Duration::from_secs(5)).await;

    info!("Parkwatch Gate Node shutdown complete");
    Ok(())
}
