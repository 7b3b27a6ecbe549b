//! Login handler
//!
//! Verifies operator credentials against the users table and hands back the
//! shared bearer token together with the operator's gate and role.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::interfaces::http::router::CloudState;
use crate::support::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<CloudState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = req.username.unwrap_or_default();
    let password = req.password.unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::BadInput("Missing login info".into()));
    }

    let user = state
        .repos
        .users()
        .find_by_username(&username)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let valid = bcrypt::verify(&password, &user.password_hash)
        .map_err(|e| ApiError::Internal(format!("Password check failed: {}", e)))?;
    if !valid {
        return Err(ApiError::Unauthorized);
    }

    info!(username = username.as_str(), gateid = user.gateid.as_str(), "Operator logged in");

    Ok(Json(json!({
        "ok": true,
        "username": user.username,
        "gateid": user.gateid,
        "role": user.role,
        "token": state.secret_token,
    })))
}
