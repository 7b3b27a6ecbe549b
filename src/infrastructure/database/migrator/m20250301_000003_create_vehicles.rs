//! Create vehicles table

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
                    .table(Vehicles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vehicles::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Vehicles::Plate).string().not_null())
                    .col(ColumnDef::new(Vehicles::Slotid).string().not_null())
                    .col(ColumnDef::new(Vehicles::Gateid).string().not_null())
                    .col(
                        ColumnDef::new(Vehicles::TimeIn)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Vehicles::TimeOut).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vehicles_slot")
                            .from(Vehicles::Table, Vehicles::Slotid)
                            .to(Slots::Table, Slots::Slotid),
                    )
                    .to_owned(),
            )
            .await?;

        // Yard-uniqueness check scans open rows by plate
        manager
            .create_index(
                Index::create()
                    .name("idx_vehicles_plate")
                    .table(Vehicles::Table)
                    .col(Vehicles::Plate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vehicles::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Vehicles {
    Table,
    Id,
    Plate,
    Slotid,
    Gateid,
    TimeIn,
    TimeOut,
}
