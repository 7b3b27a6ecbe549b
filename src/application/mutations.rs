//! Cloud mutation engine.
//!
//! Every vehicle_in / vehicle_out effect happens inside one database
//! transaction together with its invariant checks and its processed-event
//! ledger append, so two gates racing for a slot resolve to exactly one
//! commit. The engine talks to the entities directly rather than through the
//! repositories: each repository runs on the shared pool, and a mutation
//! must hold a single transaction across slots, vehicles, transactions and
//! the ledger.
//!
//! Bus frames are published after commit; the reservation release also
//! happens outside the transaction, mirroring the registry's soft role.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::{info, warn};

use crate::application::events::{BusMessage, SharedEventBus};
use crate::application::fees::calc_fee;
use crate::application::reservations::SharedReservationRegistry;
use crate::domain::{DomainError, DomainResult, Slot, Vehicle};
use crate::infrastructure::database::entities::{
    gate, processed_event, slot, transaction, vehicle,
};
use crate::support::time;

/// Inputs for a vehicle entry
#[derive(Debug, Clone, Default)]
pub struct VehicleInRequest {
    pub plate: String,
    pub gate: String,
    pub slot: String,
    pub img_in: Option<String>,
    pub event_id: Option<String>,
}

/// Inputs for a vehicle exit
#[derive(Debug, Clone, Default)]
pub struct VehicleOutRequest {
    pub plate: String,
    pub gate: Option<String>,
    pub img_out: Option<String>,
    pub event_id: Option<String>,
}

/// Result of a vehicle_in submission
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleInResult {
    Committed,
    /// The event_id was already in the ledger; nothing changed
    Dedup,
}

/// Result of a vehicle_out submission
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleOutResult {
    Committed {
        slot: String,
        fee: i64,
        duration_minutes: i64,
    },
    Dedup,
}

/// A slot annotated with the distance to a gate
#[derive(Debug, Clone, serde::Serialize)]
pub struct SlotWithDistance {
    #[serde(flatten)]
    pub slot: Slot,
    pub distance: f64,
}

/// Open vehicle + its open transaction's images, for the slot detail view
#[derive(Debug, Clone, serde::Serialize)]
pub struct SlotInfo {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub img_in: Option<String>,
    pub img_out: Option<String>,
}

/// Transactional vehicle_in / vehicle_out plus the yard read models that
/// depend on gate geometry.
pub struct MutationEngine {
    db: DatabaseConnection,
    reservations: SharedReservationRegistry,
    bus: SharedEventBus,
}

/// Trim + uppercase, the normalization applied to every plate/gate/slot id
fn norm(s: &str) -> String {
    s.trim().to_uppercase()
}

fn norm_opt(s: Option<&str>) -> Option<String> {
    s.map(norm).filter(|v| !v.is_empty())
}

/// Event ids are opaque (gate-minted UUIDs) — trimmed, never case-folded
fn norm_event_id(s: Option<&str>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl MutationEngine {
    pub fn new(
        db: DatabaseConnection,
        reservations: SharedReservationRegistry,
        bus: SharedEventBus,
    ) -> Self {
        Self {
            db,
            reservations,
            bus,
        }
    }

    // ── vehicle_in ─────────────────────────────────────────────

    pub async fn vehicle_in(&self, req: VehicleInRequest) -> DomainResult<VehicleInResult> {
        let plate = norm(&req.plate);
        let gate_id = norm(&req.gate);
        let slot_id = norm(&req.slot);
        let event_id = norm_event_id(req.event_id.as_deref());

        if plate.is_empty() || gate_id.is_empty() || slot_id.is_empty() {
            return Err(DomainError::Validation("missing plate/gate/slot".into()));
        }

        let txn = self.db.begin().await?;

        if let Some(eid) = &event_id {
            if Self::event_seen(&txn, eid).await? {
                txn.rollback().await?;
                return Ok(VehicleInResult::Dedup);
            }
        }

        if gate::Entity::find_by_id(&gate_id).one(&txn).await?.is_none() {
            return Err(DomainError::NotFound {
                entity: "Gate",
                field: "gateid",
                value: gate_id,
            });
        }

        let Some(slot_row) = slot::Entity::find_by_id(&slot_id).one(&txn).await? else {
            return Err(DomainError::NotFound {
                entity: "Slot",
                field: "slotid",
                value: slot_id,
            });
        };

        if slot_row.occupied {
            return Err(DomainError::Conflict(format!(
                "Slot {} already has a vehicle",
                slot_id
            )));
        }

        let open_vehicle = vehicle::Entity::find()
            .filter(vehicle::Column::Plate.eq(&plate))
            .filter(vehicle::Column::TimeOut.is_null())
            .one(&txn)
            .await?;
        if open_vehicle.is_some() {
            return Err(DomainError::Conflict(format!(
                "Vehicle {} is already in the yard",
                plate
            )));
        }

        // Soft lease re-check: the registry pre-arbitrates, this is the
        // authoritative word
        if let Some(owner) = self.reservations.owner(&slot_id) {
            if owner != gate_id {
                return Err(DomainError::Conflict(format!(
                    "Slot {} held by gate {}",
                    slot_id, owner
                )));
            }
        }

        let now = time::now();
        let next_version = slot_row.version + 1;

        let mut slot_active: slot::ActiveModel = slot_row.into();
        slot_active.occupied = Set(true);
        slot_active.plate = Set(Some(plate.clone()));
        slot_active.version = Set(next_version);
        slot_active.update(&txn).await?;

        vehicle::ActiveModel {
            plate: Set(plate.clone()),
            slotid: Set(slot_id.clone()),
            gateid: Set(gate_id.clone()),
            time_in: Set(now),
            time_out: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        transaction::ActiveModel {
            plate: Set(plate.clone()),
            slotid: Set(slot_id.clone()),
            gateid: Set(gate_id.clone()),
            time_in: Set(now),
            img_in: Set(req.img_in.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if let Some(eid) = &event_id {
            match Self::append_event(&txn, eid, "vehicle_in", Some(&gate_id)).await {
                Ok(()) => {}
                Err(DomainError::Conflict(_)) => {
                    // A concurrent submission won the ledger insert
                    txn.rollback().await?;
                    return Ok(VehicleInResult::Dedup);
                }
                Err(e) => return Err(e),
            }
        }

        txn.commit().await?;

        self.reservations.release(&slot_id);
        self.bus.publish(BusMessage::SlotUpdate {
            slot_id: slot_id.clone(),
            occupied: true,
            plate: Some(plate.clone()),
        });
        self.bus.publish(BusMessage::VehicleIn {
            plate: plate.clone(),
            slot: slot_id.clone(),
            gate: gate_id.clone(),
        });

        info!(plate = plate.as_str(), slot = slot_id.as_str(), gate = gate_id.as_str(), "Vehicle admitted");
        Ok(VehicleInResult::Committed)
    }

    // ── vehicle_out ────────────────────────────────────────────

    pub async fn vehicle_out(&self, req: VehicleOutRequest) -> DomainResult<VehicleOutResult> {
        let plate = norm(&req.plate);
        let gate_id = norm_opt(req.gate.as_deref());
        let event_id = norm_event_id(req.event_id.as_deref());

        if plate.is_empty() {
            return Err(DomainError::Validation("missing plate".into()));
        }

        let txn = self.db.begin().await?;

        if let Some(eid) = &event_id {
            if Self::event_seen(&txn, eid).await? {
                txn.rollback().await?;
                return Ok(VehicleOutResult::Dedup);
            }
        }

        let Some(open_vehicle) = vehicle::Entity::find()
            .filter(vehicle::Column::Plate.eq(&plate))
            .filter(vehicle::Column::TimeOut.is_null())
            .order_by_desc(vehicle::Column::TimeIn)
            .one(&txn)
            .await?
        else {
            return Err(DomainError::NotFound {
                entity: "Vehicle",
                field: "plate",
                value: plate,
            });
        };

        let slot_id = open_vehicle.slotid.clone();
        let time_out = time::now();
        let (fee, duration_minutes) = calc_fee(open_vehicle.time_in, time_out);

        if let Some(slot_row) = slot::Entity::find_by_id(&slot_id).one(&txn).await? {
            let next_version = slot_row.version + 1;
            let mut slot_active: slot::ActiveModel = slot_row.into();
            slot_active.occupied = Set(false);
            slot_active.plate = Set(None);
            slot_active.version = Set(next_version);
            slot_active.update(&txn).await?;
        } else {
            warn!(slot = slot_id, "Open vehicle references a deleted slot");
        }

        let mut vehicle_active: vehicle::ActiveModel = open_vehicle.into();
        vehicle_active.time_out = Set(Some(time_out));
        vehicle_active.update(&txn).await?;

        let Some(open_tx) = transaction::Entity::find()
            .filter(transaction::Column::Plate.eq(&plate))
            .filter(transaction::Column::TimeOut.is_null())
            .order_by_desc(transaction::Column::TimeIn)
            .one(&txn)
            .await?
        else {
            return Err(DomainError::NotFound {
                entity: "Transaction",
                field: "plate",
                value: plate,
            });
        };

        let mut tx_active: transaction::ActiveModel = open_tx.into();
        tx_active.time_out = Set(Some(time_out));
        tx_active.duration_minutes = Set(Some(duration_minutes));
        tx_active.fee = Set(Some(fee));
        tx_active.img_out = Set(req.img_out.clone());
        tx_active.update(&txn).await?;

        if let Some(eid) = &event_id {
            match Self::append_event(&txn, eid, "vehicle_out", gate_id.as_deref()).await {
                Ok(()) => {}
                Err(DomainError::Conflict(_)) => {
                    txn.rollback().await?;
                    return Ok(VehicleOutResult::Dedup);
                }
                Err(e) => return Err(e),
            }
        }

        txn.commit().await?;

        self.bus.publish(BusMessage::SlotUpdate {
            slot_id: slot_id.clone(),
            occupied: false,
            plate: None,
        });
        self.bus.publish(BusMessage::VehicleOut {
            plate: plate.clone(),
            slot: Some(slot_id.clone()),
            gate: gate_id.clone(),
        });

        info!(plate = plate.as_str(), slot = slot_id.as_str(), fee, duration_minutes, "Vehicle released");
        Ok(VehicleOutResult::Committed {
            slot: slot_id,
            fee,
            duration_minutes,
        })
    }

    // ── ledger helpers ─────────────────────────────────────────

    async fn event_seen(txn: &DatabaseTransaction, event_id: &str) -> DomainResult<bool> {
        Ok(processed_event::Entity::find_by_id(event_id)
            .one(txn)
            .await?
            .is_some())
    }

    /// Append to the ledger; a unique violation surfaces as Conflict so the
    /// caller can translate it into a dedup outcome.
    async fn append_event(
        txn: &impl ConnectionTrait,
        event_id: &str,
        event_type: &str,
        gateid: Option<&str>,
    ) -> DomainResult<()> {
        let res = processed_event::ActiveModel {
            event_id: Set(event_id.to_string()),
            event_type: Set(event_type.to_string()),
            gateid: Set(gateid.map(String::from)),
            observed_at: Set(time::now()),
        }
        .insert(txn)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DomainError::Conflict(format!(
                "Event {} already processed",
                event_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    // ── yard read models ───────────────────────────────────────

    /// Unoccupied slot closest to the gate; ties break on the lower slotid.
    pub async fn suggest_slot(&self, gateid: &str) -> DomainResult<Option<SlotWithDistance>> {
        let gateid = norm(gateid);
        let Some(g) = gate::Entity::find_by_id(&gateid).one(&self.db).await? else {
            return Err(DomainError::NotFound {
                entity: "Gate",
                field: "gateid",
                value: gateid,
            });
        };

        let free = slot::Entity::find()
            .filter(slot::Column::Occupied.eq(false))
            .all(&self.db)
            .await?;

        let mut annotated: Vec<SlotWithDistance> = free
            .into_iter()
            .map(|s| {
                let s = to_domain_slot(s);
                let distance = s.distance_to(g.x, g.y);
                SlotWithDistance { slot: s, distance }
            })
            .collect();

        annotated.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.slot.slotid.cmp(&b.slot.slotid))
        });

        Ok(annotated.into_iter().next())
    }

    /// All slots annotated with the distance to a gate, nearest first.
    pub async fn slots_for_gate(&self, gateid: &str) -> DomainResult<Vec<SlotWithDistance>> {
        let gateid = norm(gateid);
        let Some(g) = gate::Entity::find_by_id(&gateid).one(&self.db).await? else {
            return Err(DomainError::NotFound {
                entity: "Gate",
                field: "gateid",
                value: gateid,
            });
        };

        let slots = slot::Entity::find().all(&self.db).await?;
        let mut annotated: Vec<SlotWithDistance> = slots
            .into_iter()
            .map(|s| {
                let s = to_domain_slot(s);
                let distance = s.distance_to(g.x, g.y);
                SlotWithDistance { slot: s, distance }
            })
            .collect();

        annotated.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.slot.slotid.cmp(&b.slot.slotid))
        });

        Ok(annotated)
    }

    /// The open vehicle on a slot joined with its open transaction's images.
    pub async fn slot_info(&self, slotid: &str) -> DomainResult<Option<SlotInfo>> {
        let slotid = norm(slotid);

        let Some(v) = vehicle::Entity::find()
            .filter(vehicle::Column::Slotid.eq(&slotid))
            .filter(vehicle::Column::TimeOut.is_null())
            .order_by_desc(vehicle::Column::TimeIn)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let open_tx = transaction::Entity::find()
            .filter(transaction::Column::Plate.eq(&v.plate))
            .filter(transaction::Column::TimeOut.is_null())
            .order_by_desc(transaction::Column::TimeIn)
            .one(&self.db)
            .await?;

        Ok(Some(SlotInfo {
            vehicle: Vehicle {
                id: v.id,
                plate: v.plate,
                slotid: v.slotid,
                gateid: v.gateid,
                time_in: v.time_in,
                time_out: v.time_out,
            },
            img_in: open_tx.as_ref().and_then(|t| t.img_in.clone()),
            img_out: open_tx.as_ref().and_then(|t| t.img_out.clone()),
        }))
    }
}

fn to_domain_slot(s: slot::Model) -> Slot {
    Slot {
        slotid: s.slotid,
        zone: s.zone,
        x: s.x,
        y: s.y,
        occupied: s.occupied,
        plate: s.plate,
        version: s.version,
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::EventBus;
    use crate::application::reservations::ReservationRegistry;
    use crate::infrastructure::database::migrator::Migrator;
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;

    async fn test_db() -> DatabaseConnection {
        // One pooled connection so the whole test shares a single in-memory DB
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed(db: &DatabaseConnection) {
        gate::ActiveModel {
            gateid: Set("G_N".into()),
            x: Set(0.0),
            y: Set(0.0),
            last_sync: Set(None),
            role: Set("guard".into()),
        }
        .insert(db)
        .await
        .unwrap();

        gate::ActiveModel {
            gateid: Set("G_S".into()),
            x: Set(9.0),
            y: Set(5.0),
            last_sync: Set(None),
            role: Set("guard".into()),
        }
        .insert(db)
        .await
        .unwrap();

        for (id, zone, x, y) in [
            ("A1", "A", 0.0, 0.0),
            ("B2", "A", 1.0, 0.0),
            ("C3", "B", 2.0, 0.0),
        ] {
            slot::ActiveModel {
                slotid: Set(id.into()),
                zone: Set(zone.into()),
                x: Set(x),
                y: Set(y),
                occupied: Set(false),
                plate: Set(None),
                version: Set(0),
            }
            .insert(db)
            .await
            .unwrap();
        }
    }

    async fn engine() -> (MutationEngine, DatabaseConnection, SharedReservationRegistry) {
        let db = test_db().await;
        seed(&db).await;
        let reservations = ReservationRegistry::shared();
        let engine = MutationEngine::new(db.clone(), reservations.clone(), EventBus::shared());
        (engine, db, reservations)
    }

    fn in_req(plate: &str, slot: &str, event_id: Option<&str>) -> VehicleInRequest {
        VehicleInRequest {
            plate: plate.into(),
            gate: "G_N".into(),
            slot: slot.into(),
            img_in: Some("images/in/TEST_1700000000.jpg".into()),
            event_id: event_id.map(String::from),
        }
    }

    async fn load_slot(db: &DatabaseConnection, id: &str) -> slot::Model {
        slot::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn vehicle_in_happy_path() {
        let (engine, db, _) = engine().await;

        let result = engine
            .vehicle_in(in_req("51H-123.45", "A1", Some("e1")))
            .await
            .unwrap();
        assert_eq!(result, VehicleInResult::Committed);

        let s = load_slot(&db, "A1").await;
        assert!(s.occupied);
        assert_eq!(s.plate.as_deref(), Some("51H-123.45"));
        assert_eq!(s.version, 1);

        let vehicles = vehicle::Entity::find().all(&db).await.unwrap();
        assert_eq!(vehicles.len(), 1);
        assert!(vehicles[0].time_out.is_none());

        let txs = transaction::Entity::find().all(&db).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert!(txs[0].time_out.is_none());
        assert_eq!(
            txs[0].img_in.as_deref(),
            Some("images/in/TEST_1700000000.jpg")
        );

        let events = processed_event::Entity::find().all(&db).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, "e1");
        assert_eq!(events[0].event_type, "vehicle_in");
    }

    #[tokio::test]
    async fn vehicle_in_publishes_bus_frames() {
        let db = test_db().await;
        seed(&db).await;
        let bus = EventBus::shared();
        let mut sub = bus.subscribe();
        let engine = MutationEngine::new(db, ReservationRegistry::shared(), bus.clone());

        engine
            .vehicle_in(in_req("P1", "A1", Some("e1")))
            .await
            .unwrap();

        let first = sub.recv().await.unwrap();
        assert_eq!(first.message_type(), "slot_update");
        let second = sub.recv().await.unwrap();
        assert_eq!(second.message_type(), "vehicle_in");
    }

    #[tokio::test]
    async fn vehicle_in_dedup_causes_no_writes() {
        let (engine, db, _) = engine().await;

        engine
            .vehicle_in(in_req("P1", "A1", Some("e1")))
            .await
            .unwrap();

        // Same event again — the original submission retried by the drainer
        let result = engine
            .vehicle_in(in_req("P1", "A1", Some("e1")))
            .await
            .unwrap();
        assert_eq!(result, VehicleInResult::Dedup);

        let s = load_slot(&db, "A1").await;
        assert_eq!(s.version, 1);
        assert_eq!(vehicle::Entity::find().all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn vehicle_in_occupied_slot_conflicts() {
        let (engine, db, _) = engine().await;

        engine
            .vehicle_in(in_req("P1", "B2", Some("e1")))
            .await
            .unwrap();

        let err = engine
            .vehicle_in(in_req("P2", "B2", Some("e2")))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // Loser's rejection left no trace
        let s = load_slot(&db, "B2").await;
        assert_eq!(s.plate.as_deref(), Some("P1"));
        assert_eq!(s.version, 1);
        assert!(processed_event::Entity::find_by_id("e2")
            .one(&db)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn vehicle_in_plate_already_in_yard_conflicts() {
        let (engine, db, _) = engine().await;

        engine
            .vehicle_in(in_req("P1", "A1", Some("e1")))
            .await
            .unwrap();

        let err = engine
            .vehicle_in(in_req("P1", "B2", Some("e2")))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let s = load_slot(&db, "B2").await;
        assert!(!s.occupied);
        assert_eq!(s.version, 0);
    }

    #[tokio::test]
    async fn vehicle_in_unknown_gate_or_slot_is_not_found() {
        let (engine, _, _) = engine().await;

        let mut req = in_req("P1", "A1", None);
        req.gate = "G_X".into();
        assert!(matches!(
            engine.vehicle_in(req).await.unwrap_err(),
            DomainError::NotFound { entity: "Gate", .. }
        ));

        let err = engine.vehicle_in(in_req("P1", "Z9", None)).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Slot", .. }));
    }

    #[tokio::test]
    async fn vehicle_in_missing_fields_is_validation_error() {
        let (engine, _, _) = engine().await;
        let err = engine
            .vehicle_in(VehicleInRequest {
                plate: "  ".into(),
                gate: "G_N".into(),
                slot: "A1".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn foreign_reservation_blocks_vehicle_in() {
        let (engine, db, reservations) = engine().await;
        reservations.reserve("G_A", "C3", 15).unwrap();

        // G_N tries to take a slot G_A is holding
        let err = engine
            .vehicle_in(in_req("P1", "C3", Some("e1")))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(err.to_string().contains("G_A"));
        assert!(!load_slot(&db, "C3").await.occupied);
    }

    #[tokio::test]
    async fn own_reservation_allows_and_is_released() {
        let (engine, db, reservations) = engine().await;
        reservations.reserve("G_N", "C3", 15).unwrap();

        engine
            .vehicle_in(in_req("P1", "C3", Some("e1")))
            .await
            .unwrap();

        assert!(load_slot(&db, "C3").await.occupied);
        assert_eq!(reservations.inspect("C3"), None);
    }

    #[tokio::test]
    async fn inputs_are_trimmed_and_uppercased() {
        let (engine, db, _) = engine().await;

        engine
            .vehicle_in(VehicleInRequest {
                plate: "  51h-123.45 ".into(),
                gate: " g_n ".into(),
                slot: " a1 ".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let s = load_slot(&db, "A1").await;
        assert_eq!(s.plate.as_deref(), Some("51H-123.45"));
    }

    #[tokio::test]
    async fn vehicle_out_roundtrip_frees_slot_and_closes_records() {
        let (engine, db, _) = engine().await;

        engine
            .vehicle_in(in_req("P1", "A1", Some("e1")))
            .await
            .unwrap();

        let result = engine
            .vehicle_out(VehicleOutRequest {
                plate: "P1".into(),
                gate: Some("G_S".into()),
                img_out: Some("images/out/P1_1700000100.jpg".into()),
                event_id: Some("e2".into()),
            })
            .await
            .unwrap();

        match result {
            VehicleOutResult::Committed {
                slot,
                fee,
                duration_minutes,
            } => {
                assert_eq!(slot, "A1");
                assert_eq!(fee, 5000); // sub-hour stay
                assert!(duration_minutes < 60);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let s = load_slot(&db, "A1").await;
        assert!(!s.occupied);
        assert!(s.plate.is_none());
        assert_eq!(s.version, 2); // one bump in, one bump out

        let v = vehicle::Entity::find().one(&db).await.unwrap().unwrap();
        assert!(v.time_out.is_some());

        let t = transaction::Entity::find().one(&db).await.unwrap().unwrap();
        assert!(t.time_out.is_some());
        assert_eq!(t.fee, Some(5000));
        assert_eq!(
            t.img_out.as_deref(),
            Some("images/out/P1_1700000100.jpg")
        );
    }

    #[tokio::test]
    async fn vehicle_out_unknown_plate_is_not_found() {
        let (engine, _, _) = engine().await;
        let err = engine
            .vehicle_out(VehicleOutRequest {
                plate: "GHOST".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::NotFound {
                entity: "Vehicle",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn vehicle_out_dedup() {
        let (engine, db, _) = engine().await;

        engine
            .vehicle_in(in_req("P1", "A1", Some("e1")))
            .await
            .unwrap();
        engine
            .vehicle_out(VehicleOutRequest {
                plate: "P1".into(),
                event_id: Some("e2".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let result = engine
            .vehicle_out(VehicleOutRequest {
                plate: "P1".into(),
                event_id: Some("e2".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result, VehicleOutResult::Dedup);

        // Version untouched by the replay
        assert_eq!(load_slot(&db, "A1").await.version, 2);
    }

    #[tokio::test]
    async fn suggest_slot_picks_nearest_with_lexicographic_ties() {
        let (engine, _, _) = engine().await;

        // From G_N at (0,0): A1 at distance 0
        let suggestion = engine.suggest_slot("G_N").await.unwrap().unwrap();
        assert_eq!(suggestion.slot.slotid, "A1");
        assert!(suggestion.distance.abs() < f64::EPSILON);

        // Occupy A1; B2 (d=1) beats C3 (d=2)
        engine
            .vehicle_in(in_req("P1", "A1", None))
            .await
            .unwrap();
        let suggestion = engine.suggest_slot("G_N").await.unwrap().unwrap();
        assert_eq!(suggestion.slot.slotid, "B2");
    }

    #[tokio::test]
    async fn suggest_slot_tie_breaks_on_slotid() {
        let db = test_db().await;
        gate::ActiveModel {
            gateid: Set("G_N".into()),
            x: Set(0.0),
            y: Set(0.0),
            last_sync: Set(None),
            role: Set("guard".into()),
        }
        .insert(&db)
        .await
        .unwrap();
        // Two free slots equidistant from the gate
        for (id, x, y) in [("B9", 0.0, 1.0), ("A9", 1.0, 0.0)] {
            slot::ActiveModel {
                slotid: Set(id.into()),
                zone: Set("A".into()),
                x: Set(x),
                y: Set(y),
                occupied: Set(false),
                plate: Set(None),
                version: Set(0),
            }
            .insert(&db)
            .await
            .unwrap();
        }
        let engine =
            MutationEngine::new(db, ReservationRegistry::shared(), EventBus::shared());

        let suggestion = engine.suggest_slot("G_N").await.unwrap().unwrap();
        assert_eq!(suggestion.slot.slotid, "A9");
    }

    #[tokio::test]
    async fn suggest_slot_none_when_full() {
        let (engine, _, _) = engine().await;
        for (plate, slot) in [("P1", "A1"), ("P2", "B2"), ("P3", "C3")] {
            engine.vehicle_in(in_req(plate, slot, None)).await.unwrap();
        }
        assert!(engine.suggest_slot("G_N").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn slots_for_gate_sorted_by_distance() {
        let (engine, _, _) = engine().await;
        let slots = engine.slots_for_gate("G_N").await.unwrap();
        let ids: Vec<&str> = slots.iter().map(|s| s.slot.slotid.as_str()).collect();
        assert_eq!(ids, vec!["A1", "B2", "C3"]);
        assert!(slots.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn slot_info_joins_open_transaction_images() {
        let (engine, _, _) = engine().await;

        assert!(engine.slot_info("A1").await.unwrap().is_none());

        engine
            .vehicle_in(in_req("P1", "A1", None))
            .await
            .unwrap();

        let info = engine.slot_info("A1").await.unwrap().unwrap();
        assert_eq!(info.vehicle.plate, "P1");
        assert_eq!(info.vehicle.gateid, "G_N");
        assert!(info.vehicle.is_open());
        assert_eq!(info.img_in.as_deref(), Some("images/in/TEST_1700000000.jpg"));
        assert!(info.img_out.is_none());
    }
}
