//! Cloud API router
//!
//! The public set mirrors what gates and UIs must reach without credentials
//! (health probes, login, image traffic, the read-only yard views and the
//! VietQR intents); everything mutating sits behind the shared-secret
//! middleware.

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::events::SharedEventBus;
use crate::application::mutations::MutationEngine;
use crate::application::payments::PaymentService;
use crate::application::reservations::SharedReservationRegistry;
use crate::application::session::SharedGateSessionRegistry;
use crate::domain::RepositoryProvider;
use crate::infrastructure::images::ImageStore;
use crate::interfaces::http::middleware::{auth_middleware, AuthState};
use crate::interfaces::ws::ws_gate_handler;

use super::handlers::{auth, gates, health, images, payments, reservations, slots, vehicles};

/// Shared state for every Cloud handler
#[derive(Clone)]
pub struct CloudState {
    pub repos: Arc<dyn RepositoryProvider>,
    pub engine: Arc<MutationEngine>,
    pub reservations: SharedReservationRegistry,
    pub sessions: SharedGateSessionRegistry,
    pub bus: SharedEventBus,
    pub payments: Arc<PaymentService>,
    pub images: ImageStore,
    pub secret_token: String,
    pub default_reservation_ttl: u64,
    pub prometheus: PrometheusHandle,
}

async fn metrics(State(state): State<CloudState>) -> String {
    state.prometheus.render()
}

/// Create the API router with all routes
pub fn create_api_router(state: CloudState) -> Router {
    let auth_state = AuthState {
        secret_token: state.secret_token.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // ── Public routes ──────────────────────────────────────────
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics))
        .route("/login", post(auth::login))
        .route("/view_image", get(images::view_image))
        .route("/upload_image_in", post(images::upload_image_in))
        .route("/upload_image_out", post(images::upload_image_out))
        .route("/transactions", get(vehicles::list_transactions))
        .route("/slot_info/{slotid}", get(slots::slot_info))
        .route("/slots/map", get(slots::slots_map))
        .route("/payments/vietqr/create", post(payments::vietqr_create))
        .route("/ws/gate/{gateid}", get(ws_gate_handler));

    // ── Authenticated routes ───────────────────────────────────
    let authed_routes = Router::new()
        .route("/gates", get(gates::list_gates))
        .route("/heartbeat", post(gates::heartbeat))
        .route("/reserve_slot", post(reservations::reserve_slot))
        .route("/reserve_slot/{slotid}", get(reservations::get_reservation))
        .route("/slots", get(slots::slots_for_gate))
        .route("/suggest_slot/{gateid}", get(slots::suggest_slot))
        .route("/vehicle_in", post(vehicles::vehicle_in))
        .route("/vehicle_out", post(vehicles::vehicle_out))
        .route("/fee", get(vehicles::fee_quote))
        .route("/admin/slots", post(slots::admin_add_slot))
        .route(
            "/admin/slots/{slotid}",
            put(slots::admin_update_slot).delete(slots::admin_delete_slot),
        )
        .route("/admin/gates", post(gates::admin_add_gate))
        .route("/admin/gates/{gateid}", delete(gates::admin_delete_gate))
        .route("/payments/manual/create", post(payments::manual_create))
        .route("/payments/manual/confirm", post(payments::manual_confirm))
        .route("/payments/cash/confirm", post(payments::cash_confirm))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(authed_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
