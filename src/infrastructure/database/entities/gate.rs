//! Gate entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub gateid: String,

    #[sea_orm(column_type = "Double")]
    pub x: f64,

    #[sea_orm(column_type = "Double")]
    pub y: f64,

    /// Touched on heartbeat; drives the 60 s online window
    #[sea_orm(nullable)]
    pub last_sync: Option<DateTimeWithTimeZone>,

    /// "admin" or "guard"
    pub role: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
