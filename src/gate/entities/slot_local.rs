//! Local slot snapshot + optimistic deltas
//!
//! The local `version` is bumped on optimistic applies and overwritten by
//! every snapshot pull; the Cloud's version is the source of truth.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "slots_local")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub slotid: String,

    #[sea_orm(nullable)]
    pub zone: Option<String>,

    #[sea_orm(nullable, column_type = "Double")]
    pub x: Option<f64>,

    #[sea_orm(nullable, column_type = "Double")]
    pub y: Option<f64>,

    pub occupied: bool,

    #[sea_orm(nullable)]
    pub plate: Option<String>,

    pub version: i32,

    /// ISO timestamp of the last snapshot that touched this row
    #[sea_orm(nullable)]
    pub last_cloud_sync_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
