//! HTTP-boundary error taxonomy.
//!
//! Every handler returns `Result<Json<...>, ApiError>`; the kinds map onto
//! the wire statuses the gates depend on (409 is the conflict signal the
//! reconciler treats as terminal).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::DomainError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadInput(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "ok": false,
            "detail": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DomainError::Validation(msg) => ApiError::BadInput(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Unauthorized(_) => ApiError::Unauthorized,
            DomainError::Database(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        ApiError::Internal(format!("Database error: {}", err))
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::BadInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_conflict_maps_to_409() {
        let err: ApiError = DomainError::Conflict("slot A1 already has a vehicle".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn domain_not_found_keeps_message() {
        let err: ApiError = DomainError::NotFound {
            entity: "Slot",
            field: "slotid",
            value: "A9".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("A9"));
    }
}
