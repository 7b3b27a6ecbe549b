//! SeaORM implementation of GateRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use crate::domain::{DomainError, DomainResult, Gate, GateRepository, GateRole};
use crate::infrastructure::database::entities::gate;
use crate::support::time;

use super::db_err;

pub struct SeaOrmGateRepository {
    db: DatabaseConnection,
}

impl SeaOrmGateRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(g: gate::Model) -> Gate {
    Gate {
        gateid: g.gateid,
        x: g.x,
        y: g.y,
        last_sync: g.last_sync,
        role: GateRole::from_str(&g.role),
    }
}

#[async_trait]
impl GateRepository for SeaOrmGateRepository {
    async fn find_all(&self) -> DomainResult<Vec<Gate>> {
        let models = gate::Entity::find()
            .order_by_asc(gate::Column::Gateid)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_by_id(&self, gateid: &str) -> DomainResult<Option<Gate>> {
        let model = gate::Entity::find_by_id(gateid)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn save(&self, g: Gate) -> DomainResult<()> {
        debug!(gateid = g.gateid.as_str(), "Saving gate");
        let model = gate::ActiveModel {
            gateid: Set(g.gateid),
            x: Set(g.x),
            y: Set(g.y),
            last_sync: Set(g.last_sync),
            role: Set(g.role.as_str().to_string()),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn touch_last_sync(&self, gateid: &str) -> DomainResult<()> {
        let res = gate::Entity::update_many()
            .col_expr(
                gate::Column::LastSync,
                sea_orm::prelude::Expr::value(time::now()),
            )
            .filter(gate::Column::Gateid.eq(gateid))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if res.rows_affected == 0 {
            return Err(DomainError::NotFound {
                entity: "Gate",
                field: "gateid",
                value: gateid.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, gateid: &str) -> DomainResult<()> {
        let res = gate::Entity::delete_by_id(gateid)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if res.rows_affected == 0 {
            return Err(DomainError::NotFound {
                entity: "Gate",
                field: "gateid",
                value: gateid.to_string(),
            });
        }
        Ok(())
    }
}
