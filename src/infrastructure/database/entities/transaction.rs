//! Parking transaction entity — the billable park-and-leave record

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub trans_id: i32,

    pub plate: String,

    pub slotid: String,

    pub gateid: String,

    pub time_in: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub time_out: Option<DateTimeWithTimeZone>,

    /// Ceiling of the stay in minutes, set at close
    #[sea_orm(nullable)]
    pub duration_minutes: Option<i64>,

    /// Fee in opaque currency units, set at close
    #[sea_orm(nullable)]
    pub fee: Option<i64>,

    #[sea_orm(nullable)]
    pub img_in: Option<String>,

    #[sea_orm(nullable)]
    pub img_out: Option<String>,

    /// Linked when a payment for the plate is confirmed
    #[sea_orm(nullable)]
    pub payment_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::slot::Entity",
        from = "Column::Slotid",
        to = "super::slot::Column::Slotid"
    )]
    Slot,
}

impl Related<super::slot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Slot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
