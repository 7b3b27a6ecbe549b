//! SeaORM implementation of SlotRepository
//!
//! Occupancy is deliberately absent here: slots change occupancy only inside
//! the mutation engine's transactions.

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use tracing::debug;

use crate::domain::{DomainError, DomainResult, Slot, SlotRepository};
use crate::infrastructure::database::entities::slot;

use super::db_err;

pub struct SeaOrmSlotRepository {
    db: DatabaseConnection,
}

impl SeaOrmSlotRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub(crate) fn model_to_domain(s: slot::Model) -> Slot {
    Slot {
        slotid: s.slotid,
        zone: s.zone,
        x: s.x,
        y: s.y,
        occupied: s.occupied,
        plate: s.plate,
        version: s.version,
    }
}

#[async_trait]
impl SlotRepository for SeaOrmSlotRepository {
    async fn find_all(&self) -> DomainResult<Vec<Slot>> {
        let models = slot::Entity::find()
            .order_by_asc(slot::Column::Slotid)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_by_id(&self, slotid: &str) -> DomainResult<Option<Slot>> {
        let model = slot::Entity::find_by_id(slotid)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn insert(&self, s: Slot) -> DomainResult<()> {
        debug!(slotid = s.slotid.as_str(), "Creating slot");

        let existing = slot::Entity::find_by_id(&s.slotid)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            return Err(DomainError::Conflict(format!(
                "Slot {} already exists",
                s.slotid
            )));
        }

        let model = slot::ActiveModel {
            slotid: Set(s.slotid),
            zone: Set(s.zone),
            x: Set(s.x),
            y: Set(s.y),
            occupied: Set(false),
            plate: Set(None),
            version: Set(0),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn update_geometry(
        &self,
        slotid: &str,
        zone: &str,
        x: f64,
        y: f64,
    ) -> DomainResult<()> {
        let existing = slot::Entity::find_by_id(slotid)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(existing) = existing else {
            return Err(DomainError::NotFound {
                entity: "Slot",
                field: "slotid",
                value: slotid.to_string(),
            });
        };

        let mut active: slot::ActiveModel = existing.into();
        active.zone = Set(zone.to_string());
        active.x = Set(x);
        active.y = Set(y);
        active.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, slotid: &str) -> DomainResult<()> {
        let existing = slot::Entity::find_by_id(slotid)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        let Some(existing) = existing else {
            return Err(DomainError::NotFound {
                entity: "Slot",
                field: "slotid",
                value: slotid.to_string(),
            });
        };

        if existing.occupied {
            return Err(DomainError::Conflict(format!(
                "Slot {} has a vehicle in it",
                slotid
            )));
        }

        slot::Entity::delete_by_id(slotid)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::migrator::Migrator;
    use sea_orm::{ConnectOptions, Database, Set};
    use sea_orm_migration::MigratorTrait;

    async fn repo() -> SeaOrmSlotRepository {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmSlotRepository::new(db)
    }

    #[tokio::test]
    async fn insert_and_find() {
        let repo = repo().await;
        repo.insert(Slot::new("A1", "A", 1.0, 2.0)).await.unwrap();

        let found = repo.find_by_id("A1").await.unwrap().unwrap();
        assert_eq!(found.zone, "A");
        assert!(!found.occupied);
        assert_eq!(found.version, 0);
        assert!(repo.find_by_id("Z9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let repo = repo().await;
        repo.insert(Slot::new("A1", "A", 0.0, 0.0)).await.unwrap();

        let err = repo.insert(Slot::new("A1", "B", 1.0, 1.0)).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_geometry_only_touches_geometry() {
        let repo = repo().await;
        repo.insert(Slot::new("A1", "A", 0.0, 0.0)).await.unwrap();

        repo.update_geometry("A1", "B", 3.0, 4.0).await.unwrap();
        let s = repo.find_by_id("A1").await.unwrap().unwrap();
        assert_eq!(s.zone, "B");
        assert_eq!(s.x, 3.0);
        assert!(!s.occupied);

        let err = repo.update_geometry("Z9", "B", 0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_occupied_slot_conflicts() {
        let repo = repo().await;
        repo.insert(Slot::new("A1", "A", 0.0, 0.0)).await.unwrap();

        // Park a vehicle by hand — occupancy normally moves via the engine
        let existing = slot::Entity::find_by_id("A1")
            .one(&repo.db)
            .await
            .unwrap()
            .unwrap();
        let mut active: slot::ActiveModel = existing.into();
        active.occupied = Set(true);
        active.plate = Set(Some("P1".into()));
        active.version = Set(1);
        active.update(&repo.db).await.unwrap();

        let err = repo.delete("A1").await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(repo.find_by_id("A1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_free_slot_succeeds() {
        let repo = repo().await;
        repo.insert(Slot::new("A1", "A", 0.0, 0.0)).await.unwrap();
        repo.delete("A1").await.unwrap();
        assert!(repo.find_by_id("A1").await.unwrap().is_none());

        let err = repo.delete("A1").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
