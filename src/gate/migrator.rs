//! Gate-local database migrator — one migration bootstraps the whole edge
//! schema (snapshot table, event queue, sync state, reconciliation reports).

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(InitLocalSchema)]
    }
}

pub struct InitLocalSchema;

impl MigrationName for InitLocalSchema {
    fn name(&self) -> &str {
        "m20250301_000001_init_gate_local_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for InitLocalSchema {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SlotsLocal::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SlotsLocal::Slotid)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SlotsLocal::Zone).string())
                    .col(ColumnDef::new(SlotsLocal::X).double())
                    .col(ColumnDef::new(SlotsLocal::Y).double())
                    .col(
                        ColumnDef::new(SlotsLocal::Occupied)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SlotsLocal::Plate).string())
                    .col(
                        ColumnDef::new(SlotsLocal::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SlotsLocal::LastCloudSyncAt).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LocalEventQueue::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LocalEventQueue::EventId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LocalEventQueue::EventType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LocalEventQueue::Payload).string().not_null())
                    .col(
                        ColumnDef::new(LocalEventQueue::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(LocalEventQueue::CreatedAt)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The drainer scans pending rows in created_at order
        manager
            .create_index(
                Index::create()
                    .name("idx_local_event_queue_status")
                    .table(LocalEventQueue::Table)
                    .col(LocalEventQueue::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SyncState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncState::K)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncState::V).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReconciliationReports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReconciliationReports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReconciliationReports::EventId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReconciliationReports::EventType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReconciliationReports::Payload)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReconciliationReports::Detail)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReconciliationReports::SlotState).string())
                    .col(
                        ColumnDef::new(ReconciliationReports::CreatedAt)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReconciliationReports::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncState::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LocalEventQueue::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SlotsLocal::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SlotsLocal {
    Table,
    Slotid,
    Zone,
    X,
    Y,
    Occupied,
    Plate,
    Version,
    LastCloudSyncAt,
}

#[derive(Iden)]
enum LocalEventQueue {
    Table,
    EventId,
    EventType,
    Payload,
    Status,
    CreatedAt,
}

#[derive(Iden)]
enum SyncState {
    Table,
    K,
    V,
}

#[derive(Iden)]
enum ReconciliationReports {
    Table,
    Id,
    EventId,
    EventType,
    Payload,
    Detail,
    SlotState,
    CreatedAt,
}
