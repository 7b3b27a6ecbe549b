//! SeaORM implementation of UserRepository

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};

use crate::domain::{DomainResult, GateRole, User, UserRepository};
use crate::infrastructure::database::entities::user;

use super::db_err;

pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(u: user::Model) -> User {
    User {
        username: u.username,
        password_hash: u.password_hash,
        gateid: u.gateid,
        role: GateRole::from_str(&u.role),
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>> {
        let model = user::Entity::find_by_id(username)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn save(&self, u: User) -> DomainResult<()> {
        let model = user::ActiveModel {
            username: Set(u.username),
            password_hash: Set(u.password_hash),
            gateid: Set(u.gateid),
            role: Set(u.role.as_str().to_string()),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn count(&self) -> DomainResult<u64> {
        user::Entity::find().count(&self.db).await.map_err(db_err)
    }
}
