//! Gate Local API — the surface the gate UI calls.
//!
//! Every endpoint is local-first: it commits to the local store and answers
//! even with the Cloud down. Cloud pushes are best-effort here; the durable
//! queue and the drainer guarantee eventual effect.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::application::events::BusMessage;
use crate::gate::cloud_client::CloudClient;
use crate::gate::store::{GateLocalStore, STATE_LAST_CLOUD_OK_AT};
use crate::gate::ws_client::WsHandle;
use crate::infrastructure::images::{ImageKind, ImageStore};
use crate::support::errors::ApiError;
use crate::support::time;

/// Shared state for the gate handlers
#[derive(Clone)]
pub struct GateState {
    pub gate_id: String,
    pub store: Arc<GateLocalStore>,
    pub client: Arc<CloudClient>,
    pub images: ImageStore,
    pub ws: WsHandle,
}

/// Build the local API router
pub fn create_gate_router(state: GateState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/slots", get(list_slots))
        .route("/slots/map", get(slots_map))
        .route("/suggest_slot/{gateid}", get(suggest_slot))
        .route("/upload_image_in", post(upload_image_in))
        .route("/upload_image_out", post(upload_image_out))
        .route("/view_image", get(view_image))
        .route("/vehicle_in", post(vehicle_in))
        .route("/vehicle_out", post(vehicle_out))
        .route("/reconciliation_reports", get(reconciliation_reports))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ── Read endpoints ─────────────────────────────────────────────

async fn health(State(state): State<GateState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({
        "ok": true,
        "gate": state.gate_id,
        "cloud_api": state.client.base(),
        "last_cloud_ok_at": state.store.get_state(STATE_LAST_CLOUD_OK_AT).await?,
        "time": time::now().to_rfc3339(),
    })))
}

#[derive(Debug, Deserialize)]
struct SlotsQuery {
    gate_id: Option<String>,
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_mode() -> String {
    "in".to_string()
}

/// `GET /slots?mode=in|out|all`: local last-known state, filtered by
/// occupancy
async fn list_slots(
    State(state): State<GateState>,
    Query(q): Query<SlotsQuery>,
) -> Result<Json<Value>, ApiError> {
    let mode = q.mode.to_lowercase();
    let slots = state.store.list_slots().await?;

    let filtered: Vec<_> = slots
        .into_iter()
        .filter(|s| match mode.as_str() {
            "in" => !s.occupied,
            "out" => s.occupied,
            _ => true,
        })
        .collect();

    Ok(Json(json!({
        "ok": true,
        "gate": q.gate_id.unwrap_or_else(|| state.gate_id.clone()),
        "mode": mode,
        "last_cloud_ok_at": state.store.get_state(STATE_LAST_CLOUD_OK_AT).await?,
        "slots": filtered,
    })))
}

/// `GET /slots/map`: everything local, plus the last Cloud contact
async fn slots_map(State(state): State<GateState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({
        "ok": true,
        "last_cloud_ok_at": state.store.get_state(STATE_LAST_CLOUD_OK_AT).await?,
        "slots": state.store.list_slots().await?,
    })))
}

/// `GET /suggest_slot/{gateid}`: local heuristic: lowest free slotid. No
/// distance math at the edge; the Cloud owns the geometric suggestion.
async fn suggest_slot(
    State(state): State<GateState>,
    Path(gateid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let slots = state.store.list_slots().await?;
    let free = slots.into_iter().find(|s| !s.occupied);

    Ok(Json(json!({
        "ok": true,
        "slot": free.map(|s| s.slotid),
        "distance": Value::Null,
        "gate": gateid,
        "source": "local",
    })))
}

/// `GET /reconciliation_reports`: events the Cloud permanently rejected,
/// with the authoritative slot state; the operator resolves these by hand
async fn reconciliation_reports(
    State(state): State<GateState>,
) -> Result<Json<Value>, ApiError> {
    let reports = state.store.reconciliation_reports().await?;
    Ok(Json(json!({ "ok": true, "reports": reports })))
}

// ── Images ─────────────────────────────────────────────────────

async fn read_upload(mut multipart: Multipart) -> Result<(String, String, Vec<u8>), ApiError> {
    let mut plate = None;
    let mut gate = None;
    let mut bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadInput(format!("Bad multipart body: {}", e)))?
    {
        match field.name() {
            Some("plate") => plate = field.text().await.ok(),
            Some("gate") => gate = field.text().await.ok(),
            Some("file") => bytes = field.bytes().await.ok().map(|b| b.to_vec()),
            _ => {}
        }
    }

    let plate = plate
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadInput("missing plate".into()))?;
    let bytes = bytes.ok_or_else(|| ApiError::BadInput("missing file".into()))?;
    Ok((plate, gate.unwrap_or_default(), bytes))
}

/// Store locally; if the Cloud is up, forward and hand back the cloud path,
/// otherwise a `local:{absolute_path}` marker the drainer upgrades later.
async fn upload_image(
    state: GateState,
    kind: ImageKind,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (plate, gate, bytes) = read_upload(multipart).await?;
    let gate = if gate.is_empty() {
        state.gate_id.clone()
    } else {
        gate.trim().to_uppercase()
    };

    let local_path = state.images.save(kind, &plate, &bytes).await?;
    let local_abs = tokio::fs::canonicalize(&local_path)
        .await
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or(local_path.clone());

    let mut cloud_path = None;
    if state.client.health_ok().await {
        match state.client.upload_image(kind, &local_path, &plate, &gate).await {
            Ok(path) => cloud_path = Some(path),
            Err(e) => warn!(error = %e, "Best-effort image forward failed"),
        }
    }

    Ok(Json(json!({
        "ok": true,
        "local_path": local_abs,
        "path": cloud_path.unwrap_or_else(|| format!("local:{}", local_abs)),
    })))
}

async fn upload_image_in(
    State(state): State<GateState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    upload_image(state, ImageKind::In, multipart).await
}

async fn upload_image_out(
    State(state): State<GateState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    upload_image(state, ImageKind::Out, multipart).await
}

#[derive(Debug, Deserialize)]
struct ViewImageQuery {
    path: String,
}

/// `GET /view_image?path=`: serves `local:`-prefixed and plain paths from
/// the local image root
async fn view_image(
    State(state): State<GateState>,
    Query(q): Query<ViewImageQuery>,
) -> Result<Response, ApiError> {
    let path = q.path.strip_prefix("local:").unwrap_or(&q.path);
    let full = state.images.resolve(path).await?;
    let bytes = tokio::fs::read(&full)
        .await
        .map_err(|_| ApiError::NotFound("Image not found".into()))?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

// ── Vehicle mutations (local-first) ────────────────────────────

#[derive(Debug, Deserialize)]
struct VehicleInPayload {
    plate: Option<String>,
    slot: Option<String>,
    gate: Option<String>,
    img_in: Option<String>,
}

/// `POST /vehicle_in`: apply locally, enqueue, then best-effort push.
async fn vehicle_in(
    State(state): State<GateState>,
    Json(req): Json<VehicleInPayload>,
) -> Result<Json<Value>, ApiError> {
    let plate = norm_required(req.plate).ok_or_else(|| ApiError::BadInput("Missing plate/slot".into()))?;
    let slot = norm_required(req.slot).ok_or_else(|| ApiError::BadInput("Missing plate/slot".into()))?;
    let gate = norm_required(req.gate).unwrap_or_else(|| state.gate_id.clone());

    // 1) Local apply first — the UI sees the change immediately
    state.store.ensure_slot(&slot).await?;
    state.store.apply_local(&slot, true, Some(&plate)).await?;

    // 2) Durable queue entry
    let mut payload = json!({
        "type": "vehicle_in",
        "plate": plate,
        "slot": slot,
        "gate": gate,
        "img_in": req.img_in,
        "ts": time::now().timestamp_millis(),
    });
    let event_id = state.store.enqueue_event("vehicle_in", &mut payload).await?;

    // 3) Best-effort immediate push with the same event_id
    let pushed = push_now(&state, "/vehicle_in", &mut payload, ImageKind::In, "img_in").await;
    if pushed {
        state.store.mark_event_done(&event_id).await?;
    }

    // 4) Best-effort realtime replay
    state.ws.send(BusMessage::SyncEvent {
        event: payload.clone(),
    });

    Ok(Json(json!({
        "ok": true,
        "local_applied": true,
        "cloud_pushed": pushed,
        "event_id": event_id,
    })))
}

#[derive(Debug, Deserialize)]
struct VehicleOutPayload {
    plate: Option<String>,
    gate: Option<String>,
    img_out: Option<String>,
}

/// `POST /vehicle_out`: free the local slot holding the plate (if known),
/// enqueue, best-effort push. An unknown plate still queues — the Cloud may
/// know about it.
async fn vehicle_out(
    State(state): State<GateState>,
    Json(req): Json<VehicleOutPayload>,
) -> Result<Json<Value>, ApiError> {
    let plate = norm_required(req.plate).ok_or_else(|| ApiError::BadInput("Missing plate".into()))?;
    let gate = norm_required(req.gate).unwrap_or_else(|| state.gate_id.clone());

    let slot = match state.store.find_slot_by_plate(&plate).await? {
        Some(s) => {
            state.store.apply_local(&s.slotid, false, None).await?;
            Some(s.slotid)
        }
        None => {
            debug!(plate = plate.as_str(), "No local slot holds the plate; queueing anyway");
            None
        }
    };

    let mut payload = json!({
        "type": "vehicle_out",
        "plate": plate,
        "slot": slot,
        "gate": gate,
        "img_out": req.img_out,
        "ts": time::now().timestamp_millis(),
    });
    let event_id = state.store.enqueue_event("vehicle_out", &mut payload).await?;

    let pushed = push_now(&state, "/vehicle_out", &mut payload, ImageKind::Out, "img_out").await;
    if pushed {
        state.store.mark_event_done(&event_id).await?;
    }

    state.ws.send(BusMessage::SyncEvent {
        event: payload.clone(),
    });

    Ok(Json(json!({
        "ok": true,
        "local_applied": true,
        "cloud_pushed": pushed,
        "event_id": event_id,
        "slot": slot,
    })))
}

fn norm_required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_uppercase())
        .filter(|v| !v.is_empty())
}

/// Try the Cloud right now: upgrade a `local:` image path first, then POST
/// the mutation with the queued event_id. Any failure leaves the event
/// pending for the drainer.
async fn push_now(
    state: &GateState,
    endpoint: &str,
    payload: &mut Value,
    kind: ImageKind,
    img_key: &str,
) -> bool {
    if !state.client.health_ok().await {
        return false;
    }

    if let Some(local_path) = payload
        .get(img_key)
        .and_then(|v| v.as_str())
        .and_then(|v| v.strip_prefix("local:"))
        .map(String::from)
    {
        let plate = payload["plate"].as_str().unwrap_or_default().to_string();
        let gate = payload["gate"].as_str().unwrap_or_default().to_string();
        match state.client.upload_image(kind, &local_path, &plate, &gate).await {
            Ok(cloud_path) => payload[img_key] = Value::String(cloud_path),
            Err(e) => debug!(error = %e, "Image upgrade failed; keeping local path"),
        }
    }

    match state.client.post_mutation(endpoint, payload).await {
        Ok(body) => body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        Err(e) => {
            debug!(endpoint, error = %e, "Immediate cloud push failed; queued");
            false
        }
    }
}
