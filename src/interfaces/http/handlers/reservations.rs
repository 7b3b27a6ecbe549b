//! Reservation handlers — the pre-arbitration leases gates take before
//! calling vehicle_in

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::interfaces::http::router::CloudState;
use crate::support::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub gate: Option<String>,
    pub slot: Option<String>,
    pub ttl: Option<u64>,
}

/// `POST /reserve_slot`: take or refresh a lease; 409 while another gate
/// holds it
pub async fn reserve_slot(
    State(state): State<CloudState>,
    Json(req): Json<ReserveRequest>,
) -> Result<Json<Value>, ApiError> {
    let gate = req
        .gate
        .map(|g| g.trim().to_uppercase())
        .filter(|g| !g.is_empty());
    let slot = req
        .slot
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty());

    let (Some(gate), Some(slot)) = (gate, slot) else {
        return Err(ApiError::BadInput("missing gate/slot".into()));
    };

    let ttl = req.ttl.unwrap_or(state.default_reservation_ttl);
    state.reservations.reserve(&gate, &slot, ttl)?;

    Ok(Json(json!({
        "ok": true,
        "slot": slot,
        "gate": gate,
        "ttl": ttl,
    })))
}

/// `GET /reserve_slot/{slotid}`: live owner and remaining TTL (`ttl: -1`
/// when unreserved)
pub async fn get_reservation(
    State(state): State<CloudState>,
    Path(slotid): Path<String>,
) -> Json<Value> {
    let slotid = slotid.trim().to_uppercase();

    match state.reservations.inspect(&slotid) {
        Some(view) => Json(json!({
            "ok": true,
            "slot": slotid,
            "gate": view.gateid,
            "ttl": view.remaining_secs,
        })),
        None => Json(json!({
            "ok": true,
            "slot": slotid,
            "gate": Value::Null,
            "ttl": -1,
        })),
    }
}
