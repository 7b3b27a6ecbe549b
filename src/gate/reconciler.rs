//! Gate Reconciler — the two cooperative workers that converge the edge
//! with the Cloud.
//!
//! The snapshot puller overwrites `slots_local` with the authoritative map;
//! the queue drainer replays pending events with their stored event ids, so
//! the Cloud's ledger collapses at-least-once delivery into exactly-once
//! effect. Both observe the shutdown signal and exit at a loop boundary;
//! the queue is durable, so nothing is lost across restarts.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::gate::cloud_client::{CloudCallError, CloudClient};
use crate::gate::store::{GateLocalStore, QueuedEvent};
use crate::infrastructure::images::ImageKind;
use crate::support::shutdown::ShutdownSignal;

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(3);
const DRAIN_INTERVAL: Duration = Duration::from_secs(2);
const DRAIN_BATCH: u64 = 50;

/// Start the snapshot puller: every ~3 s, if the Cloud is healthy, pull
/// `/slots/map` and upsert every row. The handle goes to the shutdown
/// coordinator.
pub fn start_snapshot_puller(
    store: Arc<GateLocalStore>,
    client: Arc<CloudClient>,
    shutdown: ShutdownSignal,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Snapshot puller started");
        let mut interval = tokio::time::interval(SNAPSHOT_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = pull_snapshot_once(&store, &client).await {
                        debug!(error = %e, "Snapshot pull failed");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Snapshot puller shutting down");
                    break;
                }
            }
        }
    })
}

async fn pull_snapshot_once(
    store: &GateLocalStore,
    client: &CloudClient,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !client.health_ok().await {
        return Ok(());
    }

    let slots = client.fetch_slots_map().await?;
    store.upsert_snapshot(&slots).await?;
    Ok(())
}

/// Start the queue drainer: every ~2 s, if the Cloud is healthy, replay up
/// to 50 pending events in `created_at` order. The handle goes to the
/// shutdown coordinator; pending rows survive restarts regardless.
pub fn start_queue_drainer(
    store: Arc<GateLocalStore>,
    client: Arc<CloudClient>,
    shutdown: ShutdownSignal,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Queue drainer started");
        let mut interval = tokio::time::interval(DRAIN_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = drain_once(&store, &client).await {
                        debug!(error = %e, "Queue drain failed");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Queue drainer shutting down");
                    break;
                }
            }
        }
    })
}

async fn drain_once(
    store: &GateLocalStore,
    client: &CloudClient,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !client.health_ok().await {
        return Ok(());
    }

    let pending = store.pending_events(DRAIN_BATCH).await?;
    if pending.is_empty() {
        return Ok(());
    }

    debug!(count = pending.len(), "Draining queued events");
    for event in pending {
        replay_event(store, client, event).await?;
    }

    metrics::gauge!("parkwatch_gate_pending_events").set(store.pending_count().await? as f64);
    Ok(())
}

/// Replay one queued event. Network trouble leaves it pending; a permanent
/// rejection terminates it and files a reconciliation report.
async fn replay_event(
    store: &GateLocalStore,
    client: &CloudClient,
    mut event: QueuedEvent,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (endpoint, kind, img_key) = match event.event_type.as_str() {
        "vehicle_in" => ("/vehicle_in", ImageKind::In, "img_in"),
        "vehicle_out" => ("/vehicle_out", ImageKind::Out, "img_out"),
        other => {
            warn!(event_id = event.event_id.as_str(), event_type = other, "Unknown queued event type");
            store.mark_event_done(&event.event_id).await?;
            return Ok(());
        }
    };

    // Upgrade a still-local image before replaying the mutation
    if let Some(local_path) = event
        .payload
        .get(img_key)
        .and_then(|v| v.as_str())
        .and_then(|v| v.strip_prefix("local:"))
        .map(String::from)
    {
        let plate = event.payload["plate"].as_str().unwrap_or_default().to_string();
        let gate = event.payload["gate"].as_str().unwrap_or_default().to_string();
        match client.upload_image(kind, &local_path, &plate, &gate).await {
            Ok(cloud_path) => {
                event.payload[img_key] = Value::String(cloud_path);
            }
            Err(e) => debug!(error = %e, "Image upgrade failed; replaying with local path"),
        }
    }

    match client.post_mutation(endpoint, &event.payload).await {
        Ok(body) => {
            // ok:true covers dedup:true as well — both mean the effect exists
            if body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
                store.mark_event_done(&event.event_id).await?;
                debug!(event_id = event.event_id.as_str(), "Event replayed");
            } else {
                warn!(event_id = event.event_id.as_str(), "Cloud answered without ok; retrying");
            }
        }
        Err(CloudCallError::Rejected { status, detail })
            if is_permanent_rejection(status) =>
        {
            // Terminal: retrying can never succeed. Mark done to stop the
            // poison-pill loop and surface the divergence to a human.
            warn!(
                event_id = event.event_id.as_str(),
                %status,
                detail = detail.as_str(),
                "Event permanently rejected; filing reconciliation report"
            );

            let slot_state = match event.payload.get("slot").and_then(|v| v.as_str()) {
                Some(slotid) => client.fetch_slot_state(slotid).await,
                None => None,
            };
            store
                .record_reconciliation(&event, &detail, slot_state.as_ref())
                .await?;
            store.mark_event_done(&event.event_id).await?;
        }
        Err(CloudCallError::Rejected { status, detail }) => {
            // 401 and friends: fatal to this call, but the token or the
            // Cloud may be fixed later — keep the event pending
            warn!(
                event_id = event.event_id.as_str(),
                %status,
                detail = detail.as_str(),
                "Cloud rejected event; will retry"
            );
        }
        Err(CloudCallError::Network(e)) => {
            debug!(event_id = event.event_id.as_str(), error = %e, "Cloud unreachable; will retry");
        }
    }

    Ok(())
}

/// Conflicts and not-found/bad-input are permanent: the yard state the
/// event assumed no longer exists.
fn is_permanent_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::CONFLICT | StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST
    )
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_rejection_statuses() {
        assert!(is_permanent_rejection(StatusCode::CONFLICT));
        assert!(is_permanent_rejection(StatusCode::NOT_FOUND));
        assert!(is_permanent_rejection(StatusCode::BAD_REQUEST));
        assert!(!is_permanent_rejection(StatusCode::UNAUTHORIZED));
        assert!(!is_permanent_rejection(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_permanent_rejection(StatusCode::SERVICE_UNAVAILABLE));
    }
}
