//! SeaORM implementation of PaymentRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use crate::domain::{
    DomainError, DomainResult, Payment, PaymentMethod, PaymentRepository, PaymentStatus,
};
use crate::infrastructure::database::entities::payment;
use crate::support::time;

use super::db_err;

pub struct SeaOrmPaymentRepository {
    db: DatabaseConnection,
}

impl SeaOrmPaymentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(p: payment::Model) -> Payment {
    Payment {
        payment_id: p.payment_id,
        plate: p.plate,
        gateid: p.gateid,
        amount: p.amount,
        method: PaymentMethod::from_str(&p.method),
        status: PaymentStatus::from_str(&p.status),
        transfer_content: p.transfer_content,
        created_at: p.created_at,
        paid_at: p.paid_at,
    }
}

#[async_trait]
impl PaymentRepository for SeaOrmPaymentRepository {
    async fn insert(&self, p: Payment) -> DomainResult<()> {
        debug!(
            payment_id = p.payment_id.as_str(),
            method = p.method.as_str(),
            "Inserting payment"
        );
        let model = payment::ActiveModel {
            payment_id: Set(p.payment_id),
            plate: Set(p.plate),
            gateid: Set(p.gateid),
            amount: Set(p.amount),
            method: Set(p.method.as_str().to_string()),
            status: Set(p.status.as_str().to_string()),
            transfer_content: Set(p.transfer_content),
            created_at: Set(p.created_at),
            paid_at: Set(p.paid_at),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, payment_id: &str) -> DomainResult<Option<Payment>> {
        let model = payment::Entity::find_by_id(payment_id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn mark_paid(&self, payment_id: &str) -> DomainResult<Payment> {
        let existing = payment::Entity::find_by_id(payment_id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(existing) = existing else {
            return Err(DomainError::NotFound {
                entity: "Payment",
                field: "payment_id",
                value: payment_id.to_string(),
            });
        };

        let mut active: payment::ActiveModel = existing.into();
        active.status = Set(PaymentStatus::Paid.as_str().to_string());
        active.paid_at = Set(Some(time::now()));
        let updated = active.update(&self.db).await.map_err(db_err)?;
        Ok(model_to_domain(updated))
    }

    async fn find_for_plate(&self, plate: &str) -> DomainResult<Vec<Payment>> {
        let models = payment::Entity::find()
            .filter(payment::Column::Plate.eq(plate))
            .order_by_desc(payment::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }
}
