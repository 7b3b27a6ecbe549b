//! Gate handlers: listing, heartbeat, admin create/delete

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::application::events::BusMessage;
use crate::domain::{Gate, GateRole};
use crate::interfaces::http::router::CloudState;
use crate::support::errors::ApiError;

/// `GET /gates`: all gates with their computed online flag
pub async fn list_gates(State(state): State<CloudState>) -> Result<Json<Value>, ApiError> {
    let gates = state.repos.gates().find_all().await?;

    let rows: Vec<Value> = gates
        .iter()
        .map(|g| {
            json!({
                "gateid": g.gateid,
                "x": g.x,
                "y": g.y,
                "last_sync": g.last_sync.map(|t| t.to_rfc3339()),
                "role": g.role,
                "online": g.is_online(),
                "connected": state.sessions.is_connected(&g.gateid),
            })
        })
        .collect();

    Ok(Json(json!({ "gates": rows })))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub gateid: Option<String>,
}

/// `POST /heartbeat`: HTTP fallback for gates without a live WS session.
/// Touches `last_sync` and re-broadcasts so peers learn the gate is up.
pub async fn heartbeat(
    State(state): State<CloudState>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<Value>, ApiError> {
    let gateid = req
        .gateid
        .map(|g| g.trim().to_uppercase())
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::BadInput("missing gateid".into()))?;

    state.repos.gates().touch_last_sync(&gateid).await?;
    state.bus.publish(BusMessage::Heartbeat { gate: gateid });

    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct CreateGateRequest {
    pub gateid: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub role: Option<String>,
}

/// `POST /admin/gates`
pub async fn admin_add_gate(
    State(state): State<CloudState>,
    Json(req): Json<CreateGateRequest>,
) -> Result<Json<Value>, ApiError> {
    let gateid = req.gateid.trim().to_uppercase();
    if gateid.is_empty() {
        return Err(ApiError::BadInput("missing gateid".into()));
    }

    if state.repos.gates().find_by_id(&gateid).await?.is_some() {
        return Err(ApiError::Conflict(format!("Gate {} already exists", gateid)));
    }

    let gate = Gate {
        gateid: gateid.clone(),
        x: req.x,
        y: req.y,
        last_sync: None,
        role: GateRole::from_str(req.role.as_deref().unwrap_or("guard")),
    };
    state.repos.gates().save(gate).await?;

    info!(gateid = gateid.as_str(), "Gate created");
    Ok(Json(json!({ "ok": true })))
}

/// `DELETE /admin/gates/{gateid}`
pub async fn admin_delete_gate(
    State(state): State<CloudState>,
    Path(gateid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let gateid = gateid.trim().to_uppercase();
    state.repos.gates().delete(&gateid).await?;

    info!(gateid = gateid.as_str(), "Gate deleted");
    Ok(Json(json!({ "ok": true })))
}
