//! Repository provider: one trait bundling per-aggregate repository access.
//!
//! Transactional multi-table writes (vehicle_in / vehicle_out) do not go
//! through repositories — each repository runs on the shared pool and a
//! mutation must hold one transaction across all its tables. Those live in
//! the mutation engine; the provider serves the read paths and the payment
//! lifecycle.

use crate::domain::gate::GateRepository;
use crate::domain::payment::PaymentRepository;
use crate::domain::slot::SlotRepository;
use crate::domain::transaction::TransactionRepository;
use crate::domain::user::UserRepository;

pub trait RepositoryProvider: Send + Sync {
    fn gates(&self) -> &dyn GateRepository;

    fn slots(&self) -> &dyn SlotRepository;

    fn transactions(&self) -> &dyn TransactionRepository;

    fn payments(&self) -> &dyn PaymentRepository;

    fn users(&self) -> &dyn UserRepository;
}
