//! Image upload/serve handlers (multipart `plate`, `gate`, `file`)

use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::infrastructure::images::ImageKind;
use crate::interfaces::http::router::CloudState;
use crate::support::errors::ApiError;

struct UploadForm {
    plate: String,
    gate: Option<String>,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut plate = None;
    let mut gate = None;
    let mut bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadInput(format!("Bad multipart body: {}", e)))?
    {
        match field.name() {
            Some("plate") => {
                plate = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadInput(format!("Bad plate field: {}", e)))?,
                );
            }
            Some("gate") => {
                gate = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadInput(format!("Bad gate field: {}", e)))?,
                );
            }
            Some("file") => {
                bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadInput(format!("Bad file field: {}", e)))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let plate = plate
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadInput("missing plate".into()))?;
    let bytes = bytes.ok_or_else(|| ApiError::BadInput("missing file".into()))?;

    Ok(UploadForm { plate, gate, bytes })
}

async fn upload(state: CloudState, kind: ImageKind, multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let form = read_upload(multipart).await?;
    debug!(
        plate = form.plate.as_str(),
        gate = form.gate.as_deref().unwrap_or("-"),
        size = form.bytes.len(),
        "Image upload"
    );

    let path = state.images.save(kind, &form.plate, &form.bytes).await?;
    Ok(Json(json!({ "ok": true, "path": path })))
}

/// `POST /upload_image_in`
pub async fn upload_image_in(
    State(state): State<CloudState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    upload(state, ImageKind::In, multipart).await
}

/// `POST /upload_image_out`
pub async fn upload_image_out(
    State(state): State<CloudState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    upload(state, ImageKind::Out, multipart).await
}

#[derive(Debug, Deserialize)]
pub struct ViewImageQuery {
    pub path: String,
}

/// `GET /view_image?path=`: serve a stored plate image
pub async fn view_image(
    State(state): State<CloudState>,
    Query(q): Query<ViewImageQuery>,
) -> Result<Response, ApiError> {
    let full = state.images.resolve(&q.path).await?;
    let bytes = tokio::fs::read(&full)
        .await
        .map_err(|_| ApiError::NotFound("Image not found".into()))?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}
