//! Health check handler

use axum::Json;
use serde_json::{json, Value};

use crate::support::time;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "ok": true,
        "time": time::now().to_rfc3339(),
    }))
}
