//! Durable offline event queue
//!
//! `pending → done`, terminal once the Cloud acknowledges (or permanently
//! rejects) the event. Payload is the JSON the drainer replays.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "local_event_queue")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: String,

    pub event_type: String,

    /// JSON payload replayed to the Cloud
    pub payload: String,

    /// "pending" or "done"
    pub status: String,

    /// ISO timestamp; drain order
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
