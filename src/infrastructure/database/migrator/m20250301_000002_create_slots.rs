//! Create slots table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Slots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Slots::Slotid)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Slots::Zone).string().not_null().default(""))
                    .col(ColumnDef::new(Slots::X).double().not_null().default(0.0))
                    .col(ColumnDef::new(Slots::Y).double().not_null().default(0.0))
                    .col(
                        ColumnDef::new(Slots::Occupied)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Slots::Plate).string())
                    .col(
                        ColumnDef::new(Slots::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // Free-slot lookups back suggest_slot and the race checks
        manager
            .create_index(
                Index::create()
                    .name("idx_slots_occupied")
                    .table(Slots::Table)
                    .col(Slots::Occupied)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Slots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Slots {
    Table,
    Slotid,
    Zone,
    X,
    Y,
    Occupied,
    Plate,
    Version,
}
