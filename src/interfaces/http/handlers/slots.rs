//! Slot handlers: map, per-gate listing, suggestion, detail, admin ops

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::domain::Slot;
use crate::interfaces::http::router::CloudState;
use crate::support::errors::ApiError;

/// `GET /slots/map`: the full authoritative slot list, the gates'
/// snapshot source
pub async fn slots_map(State(state): State<CloudState>) -> Result<Json<Value>, ApiError> {
    let slots = state.repos.slots().find_all().await?;
    Ok(Json(json!({ "slots": slots })))
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub gate_id: String,
}

/// `GET /slots?gate_id=`: all slots annotated with the distance to the
/// gate, nearest first
pub async fn slots_for_gate(
    State(state): State<CloudState>,
    Query(q): Query<SlotsQuery>,
) -> Result<Json<Value>, ApiError> {
    let annotated = state.engine.slots_for_gate(&q.gate_id).await?;
    Ok(Json(json!({ "slots": annotated })))
}

/// `GET /suggest_slot/{gateid}`: Euclidean-closest free slot
pub async fn suggest_slot(
    State(state): State<CloudState>,
    Path(gateid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.engine.suggest_slot(&gateid).await? {
        Some(s) => Ok(Json(json!({
            "slot": s.slot.slotid,
            "distance": (s.distance * 100.0).round() / 100.0,
            "gate": gateid.trim().to_uppercase(),
        }))),
        None => Ok(Json(json!({ "slot": Value::Null, "distance": Value::Null }))),
    }
}

/// `GET /slot_info/{slotid}`: open vehicle + open transaction images
pub async fn slot_info(
    State(state): State<CloudState>,
    Path(slotid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let info = state.engine.slot_info(&slotid).await?;
    Ok(Json(json!({ "info": info })))
}

// ── Admin slot ops ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub slotid: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// `POST /admin/slots`: create a free slot
pub async fn admin_add_slot(
    State(state): State<CloudState>,
    Json(req): Json<CreateSlotRequest>,
) -> Result<Json<Value>, ApiError> {
    let slotid = req.slotid.trim().to_uppercase();
    if slotid.is_empty() {
        return Err(ApiError::BadInput("missing slotid".into()));
    }

    state
        .repos
        .slots()
        .insert(Slot::new(slotid.clone(), req.zone, req.x, req.y))
        .await?;

    info!(slotid = slotid.as_str(), "Slot created");
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSlotRequest {
    pub zone: String,
    pub x: f64,
    pub y: f64,
}

/// `PUT /admin/slots/{slotid}`: geometry/zone only; occupancy never moves
/// through here
pub async fn admin_update_slot(
    State(state): State<CloudState>,
    Path(slotid): Path<String>,
    Json(req): Json<UpdateSlotRequest>,
) -> Result<Json<Value>, ApiError> {
    let slotid = slotid.trim().to_uppercase();
    state
        .repos
        .slots()
        .update_geometry(&slotid, &req.zone, req.x, req.y)
        .await?;

    info!(slotid = slotid.as_str(), "Slot geometry updated");
    Ok(Json(json!({ "ok": true })))
}

/// `DELETE /admin/slots/{slotid}`: 409 while occupied
pub async fn admin_delete_slot(
    State(state): State<CloudState>,
    Path(slotid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let slotid = slotid.trim().to_uppercase();
    state.repos.slots().delete(&slotid).await?;

    info!(slotid = slotid.as_str(), "Slot deleted");
    Ok(Json(json!({ "ok": true })))
}
