//! Processed-event ledger entity
//!
//! Append-only. The primary key on `event_id` is the dedup primitive: a
//! unique violation on insert means the mutation already took effect.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "processed_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: String,

    pub event_type: String,

    #[sea_orm(nullable)]
    pub gateid: Option<String>,

    pub observed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
