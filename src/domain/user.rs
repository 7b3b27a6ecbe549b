//! Operator credentials.
//!
//! Login verifies a bcrypt hash and hands back the shared bearer token
//! together with the operator's gate and role.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::gate::GateRole;
use crate::domain::DomainResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub gateid: String,
    pub role: GateRole,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>>;

    async fn save(&self, user: User) -> DomainResult<()>;

    async fn count(&self) -> DomainResult<u64>;
}
