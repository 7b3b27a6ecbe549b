//! Reconciliation reports
//!
//! A queued event the Cloud permanently rejected, stored with the
//! authoritative slot state at rejection time. These rows are the one place
//! the system admits it cannot auto-heal: a human resolves the real-world
//! discrepancy.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reconciliation_reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub event_id: String,

    pub event_type: String,

    /// The rejected event's JSON payload
    pub payload: String,

    /// The Cloud's rejection message
    pub detail: String,

    /// Authoritative slot state at rejection time, JSON, when known
    #[sea_orm(nullable)]
    pub slot_state: Option<String>,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
