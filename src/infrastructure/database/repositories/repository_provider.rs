//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::gate::GateRepository;
use crate::domain::payment::PaymentRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::slot::SlotRepository;
use crate::domain::transaction::TransactionRepository;
use crate::domain::user::UserRepository;

use super::gate_repository::SeaOrmGateRepository;
use super::payment_repository::SeaOrmPaymentRepository;
use super::slot_repository::SeaOrmSlotRepository;
use super::transaction_repository::SeaOrmTransactionRepository;
use super::user_repository::SeaOrmUserRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
pub struct SeaOrmRepositoryProvider {
    gates: SeaOrmGateRepository,
    slots: SeaOrmSlotRepository,
    transactions: SeaOrmTransactionRepository,
    payments: SeaOrmPaymentRepository,
    users: SeaOrmUserRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            gates: SeaOrmGateRepository::new(db.clone()),
            slots: SeaOrmSlotRepository::new(db.clone()),
            transactions: SeaOrmTransactionRepository::new(db.clone()),
            payments: SeaOrmPaymentRepository::new(db.clone()),
            users: SeaOrmUserRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn gates(&self) -> &dyn GateRepository {
        &self.gates
    }

    fn slots(&self) -> &dyn SlotRepository {
        &self.slots
    }

    fn transactions(&self) -> &dyn TransactionRepository {
        &self.transactions
    }

    fn payments(&self) -> &dyn PaymentRepository {
        &self.payments
    }

    fn users(&self) -> &dyn UserRepository {
        &self.users
    }
}
