pub mod entities;
pub mod migrator;
pub mod repositories;

pub use repositories::SeaOrmRepositoryProvider;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

use crate::config::DatabasePoolConfig;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g. "sqlite://./parking.db?mode=rwc")
    pub url: String,
    /// Connection pool settings
    pub pool: DatabasePoolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./parking.db?mode=rwc".to_string(),
            pool: DatabasePoolConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Create config for a SQLite file
    pub fn sqlite(path: &str) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path),
            pool: DatabasePoolConfig::default(),
        }
    }
}

/// Initialize database connection with connection pool settings.
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, sea_orm::DbErr> {
    info!("Connecting to database: {}", config.url);

    let mut opts = ConnectOptions::new(&config.url);
    opts.max_connections(config.pool.max_connections)
        .min_connections(config.pool.min_connections)
        .connect_timeout(std::time::Duration::from_secs(
            config.pool.connect_timeout_seconds,
        ))
        .sqlx_logging(false); // We use tracing instead

    let db = Database::connect(opts).await?;
    info!("Database connected successfully");
    Ok(db)
}
