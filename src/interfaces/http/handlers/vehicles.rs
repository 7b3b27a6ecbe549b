//! Vehicle mutation handlers, the fee quote, and the transaction history

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::application::fees::{billable_hours, calc_fee, FeeQuote};
use crate::application::mutations::{
    VehicleInRequest, VehicleInResult, VehicleOutRequest, VehicleOutResult,
};
use crate::interfaces::http::router::CloudState;
use crate::support::errors::ApiError;
use crate::support::time;

#[derive(Debug, Deserialize)]
pub struct VehicleInPayload {
    pub plate: Option<String>,
    pub gate: Option<String>,
    pub slot: Option<String>,
    pub img_in: Option<String>,
    pub event_id: Option<String>,
}

/// `POST /vehicle_in`
pub async fn vehicle_in(
    State(state): State<CloudState>,
    Json(payload): Json<VehicleInPayload>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .engine
        .vehicle_in(VehicleInRequest {
            plate: payload.plate.unwrap_or_default(),
            gate: payload.gate.unwrap_or_default(),
            slot: payload.slot.unwrap_or_default(),
            img_in: payload.img_in,
            event_id: payload.event_id,
        })
        .await?;

    match result {
        VehicleInResult::Committed => Ok(Json(json!({ "ok": true }))),
        VehicleInResult::Dedup => Ok(Json(json!({ "ok": true, "dedup": true }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct VehicleOutPayload {
    pub plate: Option<String>,
    pub gate: Option<String>,
    pub img_out: Option<String>,
    pub event_id: Option<String>,
}

/// `POST /vehicle_out`
pub async fn vehicle_out(
    State(state): State<CloudState>,
    Json(payload): Json<VehicleOutPayload>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .engine
        .vehicle_out(VehicleOutRequest {
            plate: payload.plate.unwrap_or_default(),
            gate: payload.gate,
            img_out: payload.img_out,
            event_id: payload.event_id,
        })
        .await?;

    match result {
        VehicleOutResult::Committed {
            slot,
            fee,
            duration_minutes,
        } => Ok(Json(json!({
            "ok": true,
            "slot": slot,
            "fee": fee,
            "duration_minutes": duration_minutes,
        }))),
        VehicleOutResult::Dedup => Ok(Json(json!({ "ok": true, "dedup": true }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct FeeQuery {
    pub plate: String,
}

/// `GET /fee?plate=`: quote for the plate's open stay, priced as if it
/// ended now
pub async fn fee_quote(
    State(state): State<CloudState>,
    Query(q): Query<FeeQuery>,
) -> Result<Json<FeeQuote>, ApiError> {
    let plate = q.plate.trim().to_uppercase();
    if plate.is_empty() {
        return Err(ApiError::BadInput("missing plate".into()));
    }

    let open = state
        .repos
        .transactions()
        .find_open_for_plate(&plate)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No open stay for plate {}", plate)))?;

    let time_out = time::now();
    let (amount, duration_minutes) = calc_fee(open.time_in, time_out);

    Ok(Json(FeeQuote {
        ok: true,
        plate,
        slot: open.slotid,
        gate: open.gateid,
        time_in: open.time_in,
        time_out,
        duration_minutes,
        duration_hours: billable_hours(duration_minutes),
        amount,
        trans_id: open.trans_id,
    }))
}

/// `GET /transactions`: full park-and-leave history, newest first
pub async fn list_transactions(
    State(state): State<CloudState>,
) -> Result<Json<Value>, ApiError> {
    let transactions = state.repos.transactions().find_all().await?;
    Ok(Json(json!({ "ok": true, "transactions": transactions })))
}
