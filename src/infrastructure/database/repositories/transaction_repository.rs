//! SeaORM implementation of TransactionRepository
//!
//! Read-side access plus payment linkage. Opening and closing transactions
//! happens inside the mutation engine's database transactions.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use crate::domain::{DomainError, DomainResult, ParkingTransaction, TransactionRepository};
use crate::infrastructure::database::entities::transaction;

use super::db_err;

pub struct SeaOrmTransactionRepository {
    db: DatabaseConnection,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub(crate) fn model_to_domain(t: transaction::Model) -> ParkingTransaction {
    ParkingTransaction {
        trans_id: t.trans_id,
        plate: t.plate,
        slotid: t.slotid,
        gateid: t.gateid,
        time_in: t.time_in,
        time_out: t.time_out,
        duration_minutes: t.duration_minutes,
        fee: t.fee,
        img_in: t.img_in,
        img_out: t.img_out,
        payment_id: t.payment_id,
    }
}

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn find_all(&self) -> DomainResult<Vec<ParkingTransaction>> {
        let models = transaction::Entity::find()
            .order_by_desc(transaction::Column::TimeIn)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_open_for_plate(
        &self,
        plate: &str,
    ) -> DomainResult<Option<ParkingTransaction>> {
        let model = transaction::Entity::find()
            .filter(transaction::Column::Plate.eq(plate))
            .filter(transaction::Column::TimeOut.is_null())
            .order_by_desc(transaction::Column::TimeIn)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn set_payment_id(&self, trans_id: i32, payment_id: &str) -> DomainResult<()> {
        debug!(trans_id, payment_id, "Linking payment to transaction");

        let existing = transaction::Entity::find_by_id(trans_id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(existing) = existing else {
            return Err(DomainError::NotFound {
                entity: "Transaction",
                field: "trans_id",
                value: trans_id.to_string(),
            });
        };

        let mut active: transaction::ActiveModel = existing.into();
        active.payment_id = Set(Some(payment_id.to_string()));
        active.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}
