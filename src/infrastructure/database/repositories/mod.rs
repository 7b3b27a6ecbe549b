mod gate_repository;
mod payment_repository;
mod repository_provider;
mod slot_repository;
mod transaction_repository;
mod user_repository;

pub use gate_repository::SeaOrmGateRepository;
pub use payment_repository::SeaOrmPaymentRepository;
pub use repository_provider::SeaOrmRepositoryProvider;
pub use slot_repository::SeaOrmSlotRepository;
pub use transaction_repository::SeaOrmTransactionRepository;
pub use user_repository::SeaOrmUserRepository;

use crate::domain::DomainError;

/// Map a SeaORM error into the domain taxonomy.
pub(crate) fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Database(e)
}
