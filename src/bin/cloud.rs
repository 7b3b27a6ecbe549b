//! Parkwatch Cloud — the central coordinator.
//!
//! Owns the authoritative store, the reservation registry, the mutation
//! engine and the realtime fan-out to every gate.

use std::sync::Arc;

use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use parkwatch::application::mutations::MutationEngine;
use parkwatch::application::payments::PaymentService;
use parkwatch::application::reservations::{start_reservation_sweeper, ReservationRegistry};
use parkwatch::application::session::GateSessionRegistry;
use parkwatch::domain::{GateRole, RepositoryProvider, User};
use parkwatch::infrastructure::database::migrator::Migrator;
use parkwatch::infrastructure::images::ImageStore;
use parkwatch::interfaces::http::CloudState;
use parkwatch::support::shutdown::ShutdownCoordinator;
use parkwatch::{
    create_api_router, default_config_path, init_database, AppConfig, DatabaseConfig, EventBus,
    SeaOrmRepositoryProvider,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("PARKWATCH_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config: {}. Using defaults.", e);
            let mut cfg = AppConfig::default();
            cfg.apply_env_overrides();
            cfg
        }
    };

    info!("Starting Parkwatch Cloud...");

    // ── Prometheus metrics recorder ────────────────────────────
    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    // ── Database ───────────────────────────────────────────────
    let db_config = DatabaseConfig {
        url: cfg.database.connection_url(),
        pool: cfg.database.pool.clone(),
    };
    let db = match init_database(&db_config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    info!("Running database migrations...");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run migrations: {}", e);
        return Err(e.into());
    }
    info!("Migrations completed");

    // ── Repositories & services ────────────────────────────────
    let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));

    create_default_admin(repos.as_ref(), &cfg).await;

    let reservations = ReservationRegistry::shared();
    let bus = EventBus::shared();
    let sessions = GateSessionRegistry::shared();
    let engine = Arc::new(MutationEngine::new(
        db.clone(),
        reservations.clone(),
        bus.clone(),
    ));
    let payments = Arc::new(PaymentService::new(repos.clone(), cfg.bank.clone()));

    let images = ImageStore::new(&cfg.server.image_dir);
    images.ensure_dirs().await?;

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = ShutdownCoordinator::new();
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    shutdown.register(
        "reservation-sweeper",
        start_reservation_sweeper(
            reservations.clone(),
            shutdown_signal.clone(),
            cfg.reservations.sweep_interval_secs,
        ),
    );

    // ── HTTP + WebSocket server ────────────────────────────────
    let state = CloudState {
        repos,
        engine,
        reservations,
        sessions,
        bus,
        payments,
        images,
        secret_token: cfg.security.secret_token.clone(),
        default_reservation_ttl: cfg.reservations.default_ttl_secs,
        prometheus,
    };
    let router = create_api_router(state);

    let addr = format!("{}:{}", cfg.server.api_host, cfg.server.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Cloud API listening on http://{}", addr);

    let serve_shutdown = shutdown_signal.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            serve_shutdown.wait().await;
            info!("Cloud API received shutdown signal");
        })
        .await?;

    // ── Final cleanup ──────────────────────────────────────────
    shutdown.drain(std::time::Duration::from_secs(5)).await;

    if let Err(e) = db.close().await {
        warn!("Error closing database connection: {}", e);
    } else {
        info!("Database connection closed");
    }

    info!("Parkwatch Cloud shutdown complete");
    Ok(())
}

/// Create the default admin user if no users exist
async fn create_default_admin(repos: &dyn RepositoryProvider, cfg: &AppConfig) {
    let count = match repos.users().count().await {
        Ok(count) => count,
        Err(e) => {
            error!("Failed to count users: {}", e);
            return;
        }
    };
    if count > 0 {
        return;
    }

    info!("Creating default admin user...");
    let password_hash = match bcrypt::hash(&cfg.admin.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(e) => {
            error!("Failed to hash admin password: {}", e);
            return;
        }
    };

    let admin = User {
        username: cfg.admin.username.clone(),
        password_hash,
        gateid: cfg.admin.gateid.clone(),
        role: GateRole::Admin,
    };

    match repos.users().save(admin).await {
        Ok(()) => {
            info!("Default admin created: {}", cfg.admin.username);
            warn!("Please change the admin password immediately!");
        }
        Err(e) => {
            error!("Failed to create admin user: {}", e);
        }
    }
}
