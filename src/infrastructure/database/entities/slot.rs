//! Slot entity
//!
//! `occupied ⇔ plate IS NOT NULL`; `version` bumps by exactly one per
//! mutation. Cycles with vehicles/transactions are stored by identifier and
//! resolved with joins on read, never by embedded reference.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "slots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub slotid: String,

    pub zone: String,

    #[sea_orm(column_type = "Double")]
    pub x: f64,

    #[sea_orm(column_type = "Double")]
    pub y: f64,

    pub occupied: bool,

    #[sea_orm(nullable)]
    pub plate: Option<String>,

    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
