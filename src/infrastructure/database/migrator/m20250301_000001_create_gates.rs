//! Create gates table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Gates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Gates::Gateid)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Gates::X).double().not_null())
                    .col(ColumnDef::new(Gates::Y).double().not_null())
                    .col(ColumnDef::new(Gates::LastSync).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Gates::Role)
                            .string()
                            .not_null()
                            .default("guard"),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Gates::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Gates {
    Table,
    Gateid,
    X,
    Y,
    LastSync,
    Role,
}
