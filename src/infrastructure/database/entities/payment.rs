//! Payment entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// UUID string
    #[sea_orm(primary_key, auto_increment = false)]
    pub payment_id: String,

    pub plate: String,

    #[sea_orm(nullable)]
    pub gateid: Option<String>,

    pub amount: i64,

    /// "vietqr", "online_manual" or "cash"
    pub method: String,

    /// "PENDING" or "PAID"
    pub status: String,

    /// Bank-transfer memo shown to the driver
    #[sea_orm(nullable)]
    pub transfer_content: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub paid_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
