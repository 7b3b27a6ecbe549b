//! Vehicle entity — one row per presence in the yard

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub plate: String,

    pub slotid: String,

    /// Entry gate
    pub gateid: String,

    pub time_in: DateTimeWithTimeZone,

    /// NULL while the vehicle is still in the yard
    #[sea_orm(nullable)]
    pub time_out: Option<DateTimeWithTimeZone>,
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
