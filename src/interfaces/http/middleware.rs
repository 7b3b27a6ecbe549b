//! Shared-secret bearer authentication middleware.
//!
//! Every gate and operator station holds the same deployment secret; login
//! hands it out after a credential check. Public routes (health, login,
//! image serving, the read-only yard views and the VietQR intents) bypass
//! the middleware entirely by living on an unguarded router.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::support::errors::ApiError;

/// State for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub secret_token: String,
}

/// Accepts `Authorization: Bearer <secret>`; a bare token is tolerated the
/// way the gate clients have historically sent it.
fn extract_token(auth_header: &str) -> &str {
    auth_header
        .strip_prefix("Bearer")
        .unwrap_or(auth_header)
        .trim()
}

pub async fn auth_middleware(
    State(auth): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(extract_token);

    match token {
        Some(token) if token == auth.secret_token => next.run(request).await,
        _ => ApiError::Unauthorized.into_response(),
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_token("Bearer secret-key"), "secret-key");
        assert_eq!(extract_token("Bearer   secret-key "), "secret-key");
    }

    #[test]
    fn accepts_bare_token() {
        assert_eq!(extract_token("secret-key"), "secret-key");
    }
}
