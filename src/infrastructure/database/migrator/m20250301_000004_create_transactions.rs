//! Create transactions table

use sea_orm_migration::prelude::*;

use super::m20250301_000002_create_slots::Slots;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::TransId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::Plate).string().not_null())
                    .col(ColumnDef::new(Transactions::Slotid).string().not_null())
                    .col(ColumnDef::new(Transactions::Gateid).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::TimeIn)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::TimeOut).timestamp_with_time_zone())
                    .col(ColumnDef::new(Transactions::DurationMinutes).big_integer())
                    .col(ColumnDef::new(Transactions::Fee).big_integer())
                    .col(ColumnDef::new(Transactions::ImgIn).string())
                    .col(ColumnDef::new(Transactions::ImgOut).string())
                    .col(ColumnDef::new(Transactions::PaymentId).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_slot")
                            .from(Transactions::Table, Transactions::Slotid)
                            .to(Slots::Table, Slots::Slotid),
                    )
                    .to_owned(),
            )
            .await?;

        // The fee quote and vehicle_out both look up the open transaction
        // for a plate
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_plate")
                    .table(Transactions::Table)
                    .col(Transactions::Plate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Transactions {
    Table,
    TransId,
    Plate,
    Slotid,
    Gateid,
    TimeIn,
    TimeOut,
    DurationMinutes,
    Fee,
    ImgIn,
    ImgOut,
    PaymentId,
}
