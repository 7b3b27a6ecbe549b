//! Gate Local Store
//!
//! A single SQLite file holding the slot snapshot, the durable offline
//! event queue, the sync-state k/v table and the reconciliation reports.
//! All mutators live in one process (the local HTTP handlers and the two
//! reconciler workers), so short transactions are enough.

use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectOptions, Database,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{DomainError, DomainResult};
use crate::gate::entities::{event_queue, reconciliation_report, slot_local, sync_state};
use crate::gate::migrator::Migrator;
use crate::support::time;
use sea_orm_migration::MigratorTrait;

/// Key under which the last successful Cloud contact is stored
pub const STATE_LAST_CLOUD_OK_AT: &str = "last_cloud_ok_at";
/// Key under which the last measured WebSocket RTT is stored
pub const STATE_LAST_RTT_MS: &str = "last_rtt_ms";

/// One slot row as the Cloud snapshot delivers it
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SnapshotSlot {
    pub slotid: String,
    pub zone: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub occupied: bool,
    pub plate: Option<String>,
    #[serde(default)]
    pub version: i32,
}

/// A pending queue entry ready for replay
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub event_id: String,
    pub event_type: String,
    pub payload: Value,
    pub created_at: String,
}

pub struct GateLocalStore {
    db: DatabaseConnection,
}

impl GateLocalStore {
    /// Open (and migrate) the local database file.
    pub async fn open(path: &str) -> Result<Self, sea_orm::DbErr> {
        let url = format!("sqlite://{}?mode=rwc", path);
        let mut opts = ConnectOptions::new(&url);
        // Single writer process; one connection keeps SQLite happy
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await?;
        Migrator::up(&db, None).await?;
        info!(path, "Gate local store opened");
        Ok(Self { db })
    }

    /// In-memory store for tests.
    pub async fn open_in_memory() -> Result<Self, sea_orm::DbErr> {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await?;
        Migrator::up(&db, None).await?;
        Ok(Self { db })
    }

    // ── Slot snapshot ──────────────────────────────────────────

    /// Upsert a Cloud snapshot and stamp `last_cloud_ok_at`. The snapshot is
    /// the reconvergence point: local occupancy, plate and version are all
    /// overwritten.
    pub async fn upsert_snapshot(&self, slots: &[SnapshotSlot]) -> DomainResult<()> {
        let ts = time::now().to_rfc3339();

        for s in slots {
            let model = slot_local::ActiveModel {
                slotid: Set(s.slotid.clone()),
                zone: Set(s.zone.clone()),
                x: Set(s.x),
                y: Set(s.y),
                occupied: Set(s.occupied),
                plate: Set(s.plate.clone()),
                version: Set(s.version),
                last_cloud_sync_at: Set(Some(ts.clone())),
            };
            slot_local::Entity::insert(model)
                .on_conflict(
                    OnConflict::column(slot_local::Column::Slotid)
                        .update_columns([
                            slot_local::Column::Zone,
                            slot_local::Column::X,
                            slot_local::Column::Y,
                            slot_local::Column::Occupied,
                            slot_local::Column::Plate,
                            slot_local::Column::Version,
                            slot_local::Column::LastCloudSyncAt,
                        ])
                        .to_owned(),
                )
                .exec(&self.db)
                .await?;
        }

        self.set_state(STATE_LAST_CLOUD_OK_AT, &ts).await?;
        debug!(count = slots.len(), "Snapshot upserted");
        Ok(())
    }

    /// All local slots ordered by slotid
    pub async fn list_slots(&self) -> DomainResult<Vec<slot_local::Model>> {
        Ok(slot_local::Entity::find()
            .order_by_asc(slot_local::Column::Slotid)
            .all(&self.db)
            .await?)
    }

    pub async fn get_slot(&self, slotid: &str) -> DomainResult<Option<slot_local::Model>> {
        Ok(slot_local::Entity::find_by_id(slotid).one(&self.db).await?)
    }

    /// The local slot currently holding a plate, if any
    pub async fn find_slot_by_plate(
        &self,
        plate: &str,
    ) -> DomainResult<Option<slot_local::Model>> {
        Ok(slot_local::Entity::find()
            .filter(slot_local::Column::Occupied.eq(true))
            .filter(slot_local::Column::Plate.eq(plate))
            .one(&self.db)
            .await?)
    }

    /// Make sure a minimal row exists (the UI may act before the first
    /// snapshot lands).
    pub async fn ensure_slot(&self, slotid: &str) -> DomainResult<()> {
        let model = slot_local::ActiveModel {
            slotid: Set(slotid.to_string()),
            zone: Set(None),
            x: Set(None),
            y: Set(None),
            occupied: Set(false),
            plate: Set(None),
            version: Set(0),
            last_cloud_sync_at: Set(None),
        };
        slot_local::Entity::insert(model)
            .on_conflict(
                OnConflict::column(slot_local::Column::Slotid)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Optimistic local apply: set occupancy and bump the local version.
    pub async fn apply_local(
        &self,
        slotid: &str,
        occupied: bool,
        plate: Option<&str>,
    ) -> DomainResult<()> {
        let Some(existing) = slot_local::Entity::find_by_id(slotid).one(&self.db).await? else {
            return Err(DomainError::NotFound {
                entity: "Slot",
                field: "slotid",
                value: slotid.to_string(),
            });
        };

        let next_version = existing.version + 1;
        let mut active: slot_local::ActiveModel = existing.into();
        active.occupied = Set(occupied);
        active.plate = Set(plate.map(String::from));
        active.version = Set(next_version);
        active.update(&self.db).await?;
        Ok(())
    }

    /// Apply a realtime slot_update frame: occupancy only, no version bump —
    /// the next snapshot settles the version.
    pub async fn apply_remote(
        &self,
        slotid: &str,
        occupied: bool,
        plate: Option<&str>,
    ) -> DomainResult<()> {
        if let Some(existing) = slot_local::Entity::find_by_id(slotid).one(&self.db).await? {
            let mut active: slot_local::ActiveModel = existing.into();
            active.occupied = Set(occupied);
            active.plate = Set(plate.map(String::from));
            active.update(&self.db).await?;
        }
        Ok(())
    }

    // ── Event queue ────────────────────────────────────────────

    /// Queue an event for replay. Uses the payload's `event_id` when present
    /// (re-enqueueing replaces the row), otherwise mints one and writes it
    /// back into the payload.
    pub async fn enqueue_event(
        &self,
        event_type: &str,
        payload: &mut Value,
    ) -> DomainResult<String> {
        let event_id = payload
            .get("event_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        payload["event_id"] = Value::String(event_id.clone());

        let model = event_queue::ActiveModel {
            event_id: Set(event_id.clone()),
            event_type: Set(event_type.to_string()),
            payload: Set(payload.to_string()),
            status: Set("pending".to_string()),
            created_at: Set(time::now().to_rfc3339()),
        };
        event_queue::Entity::insert(model)
            .on_conflict(
                OnConflict::column(event_queue::Column::EventId)
                    .update_columns([
                        event_queue::Column::EventType,
                        event_queue::Column::Payload,
                        event_queue::Column::Status,
                        event_queue::Column::CreatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        debug!(event_id = event_id.as_str(), event_type, "Event queued");
        Ok(event_id)
    }

    /// Oldest pending events, up to `limit`
    pub async fn pending_events(&self, limit: u64) -> DomainResult<Vec<QueuedEvent>> {
        let rows = event_queue::Entity::find()
            .filter(event_queue::Column::Status.eq("pending"))
            .order_by_asc(event_queue::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| QueuedEvent {
                event_id: r.event_id,
                event_type: r.event_type,
                payload: serde_json::from_str(&r.payload).unwrap_or(Value::Null),
                created_at: r.created_at,
            })
            .collect())
    }

    pub async fn mark_event_done(&self, event_id: &str) -> DomainResult<()> {
        if let Some(existing) = event_queue::Entity::find_by_id(event_id).one(&self.db).await? {
            let mut active: event_queue::ActiveModel = existing.into();
            active.status = Set("done".to_string());
            active.update(&self.db).await?;
        }
        Ok(())
    }

    pub async fn pending_count(&self) -> DomainResult<u64> {
        Ok(event_queue::Entity::find()
            .filter(event_queue::Column::Status.eq("pending"))
            .count(&self.db)
            .await?)
    }

    // ── Sync state ─────────────────────────────────────────────

    pub async fn set_state(&self, key: &str, value: &str) -> DomainResult<()> {
        let model = sync_state::ActiveModel {
            k: Set(key.to_string()),
            v: Set(value.to_string()),
        };
        sync_state::Entity::insert(model)
            .on_conflict(
                OnConflict::column(sync_state::Column::K)
                    .update_column(sync_state::Column::V)
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn get_state(&self, key: &str) -> DomainResult<Option<String>> {
        Ok(sync_state::Entity::find_by_id(key)
            .one(&self.db)
            .await?
            .map(|row| row.v))
    }

    // ── Reconciliation reports ─────────────────────────────────

    /// Record a permanently rejected event together with the authoritative
    /// slot state, for a human to resolve.
    pub async fn record_reconciliation(
        &self,
        event: &QueuedEvent,
        detail: &str,
        slot_state: Option<&Value>,
    ) -> DomainResult<()> {
        reconciliation_report::ActiveModel {
            event_id: Set(event.event_id.clone()),
            event_type: Set(event.event_type.clone()),
            payload: Set(event.payload.to_string()),
            detail: Set(detail.to_string()),
            slot_state: Set(slot_state.map(|v| v.to_string())),
            created_at: Set(time::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    pub async fn reconciliation_reports(
        &self,
    ) -> DomainResult<Vec<reconciliation_report::Model>> {
        Ok(reconciliation_report::Entity::find()
            .order_by_desc(reconciliation_report::Column::Id)
            .all(&self.db)
            .await?)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(slotid: &str, occupied: bool, plate: Option<&str>, version: i32) -> SnapshotSlot {
        SnapshotSlot {
            slotid: slotid.into(),
            zone: Some("A".into()),
            x: Some(0.0),
            y: Some(0.0),
            occupied,
            plate: plate.map(String::from),
            version,
        }
    }

    #[tokio::test]
    async fn snapshot_upsert_overwrites_local_state() {
        let store = GateLocalStore::open_in_memory().await.unwrap();

        store
            .upsert_snapshot(&[snapshot("A1", false, None, 3)])
            .await
            .unwrap();

        // Optimistic local apply diverges from the Cloud
        store.apply_local("A1", true, Some("P9")).await.unwrap();
        let s = store.get_slot("A1").await.unwrap().unwrap();
        assert!(s.occupied);
        assert_eq!(s.version, 4);

        // Next snapshot heals the divergence, version included
        store
            .upsert_snapshot(&[snapshot("A1", true, Some("P1"), 7)])
            .await
            .unwrap();
        let s = store.get_slot("A1").await.unwrap().unwrap();
        assert_eq!(s.plate.as_deref(), Some("P1"));
        assert_eq!(s.version, 7);

        assert!(store
            .get_state(STATE_LAST_CLOUD_OK_AT)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn ensure_slot_is_idempotent_and_preserves_state() {
        let store = GateLocalStore::open_in_memory().await.unwrap();

        store.ensure_slot("C3").await.unwrap();
        store.apply_local("C3", true, Some("P3")).await.unwrap();

        // Ensuring again must not reset the occupied row
        store.ensure_slot("C3").await.unwrap();
        let s = store.get_slot("C3").await.unwrap().unwrap();
        assert!(s.occupied);
        assert_eq!(s.plate.as_deref(), Some("P3"));
    }

    #[tokio::test]
    async fn find_slot_by_plate() {
        let store = GateLocalStore::open_in_memory().await.unwrap();
        store.ensure_slot("A1").await.unwrap();
        store.ensure_slot("B2").await.unwrap();
        store.apply_local("B2", true, Some("P1")).await.unwrap();

        let found = store.find_slot_by_plate("P1").await.unwrap().unwrap();
        assert_eq!(found.slotid, "B2");
        assert!(store.find_slot_by_plate("P2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enqueue_mints_event_id_and_orders_by_created_at() {
        let store = GateLocalStore::open_in_memory().await.unwrap();

        let mut p1 = json!({"type": "vehicle_in", "plate": "P1", "slot": "A1"});
        let id1 = store.enqueue_event("vehicle_in", &mut p1).await.unwrap();
        assert_eq!(p1["event_id"], Value::String(id1.clone()));

        let mut p2 = json!({"type": "vehicle_out", "plate": "P1", "event_id": "fixed-id"});
        let id2 = store.enqueue_event("vehicle_out", &mut p2).await.unwrap();
        assert_eq!(id2, "fixed-id");

        let pending = store.pending_events(50).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].event_id, id1); // oldest first
        assert_eq!(pending[1].event_id, "fixed-id");
    }

    #[tokio::test]
    async fn mark_done_removes_from_pending() {
        let store = GateLocalStore::open_in_memory().await.unwrap();

        let mut p = json!({"plate": "P1"});
        let id = store.enqueue_event("vehicle_in", &mut p).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);

        store.mark_event_done(&id).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert!(store.pending_events(50).await.unwrap().is_empty());

        // Marking an unknown event is a no-op
        store.mark_event_done("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn apply_remote_does_not_bump_version() {
        let store = GateLocalStore::open_in_memory().await.unwrap();
        store
            .upsert_snapshot(&[snapshot("A1", false, None, 5)])
            .await
            .unwrap();

        store.apply_remote("A1", true, Some("P1")).await.unwrap();
        let s = store.get_slot("A1").await.unwrap().unwrap();
        assert!(s.occupied);
        assert_eq!(s.version, 5);

        // Unknown slot: ignored, the snapshot will introduce it
        store.apply_remote("Z9", true, Some("P2")).await.unwrap();
        assert!(store.get_slot("Z9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sync_state_roundtrip() {
        let store = GateLocalStore::open_in_memory().await.unwrap();
        assert_eq!(store.get_state("missing").await.unwrap(), None);

        store.set_state("last_rtt_ms", "42").await.unwrap();
        store.set_state("last_rtt_ms", "17").await.unwrap();
        assert_eq!(
            store.get_state("last_rtt_ms").await.unwrap().as_deref(),
            Some("17")
        );
    }

    #[tokio::test]
    async fn reconciliation_report_roundtrip() {
        let store = GateLocalStore::open_in_memory().await.unwrap();

        let mut p = json!({"type": "vehicle_in", "plate": "P1", "slot": "A1"});
        let id = store.enqueue_event("vehicle_in", &mut p).await.unwrap();
        let event = store.pending_events(1).await.unwrap().remove(0);

        store
            .record_reconciliation(
                &event,
                "Slot A1 already has a vehicle",
                Some(&json!({"slotid": "A1", "occupied": true, "plate": "P7"})),
            )
            .await
            .unwrap();

        let reports = store.reconciliation_reports().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].event_id, id);
        assert!(reports[0].detail.contains("already has a vehicle"));
        assert!(reports[0].slot_state.as_deref().unwrap().contains("P7"));
    }
}
