pub mod database;
pub mod images;

pub use database::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use images::ImageStore;
