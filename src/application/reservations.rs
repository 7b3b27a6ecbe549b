//! Reservation registry — short-lived TTL leases on free slots.
//!
//! Reservations arbitrate concurrent IN attempts between gates before the
//! authoritative in-transaction occupancy check. They are soft and volatile:
//! the registry lives in process memory, liveness is decided by
//! `expires_at > now` on every read, and an expired lease simply stops
//! existing. The mutation engine re-checks ownership inside the vehicle_in
//! transaction and releases the lease on success.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use dashmap::DashMap;
use tokio::time::Duration as TokioDuration;
use tracing::{debug, info, warn};

use crate::domain::{DomainError, DomainResult};
use crate::support::shutdown::ShutdownSignal;
use crate::support::time;

/// Default lease TTL when the caller does not send one (seconds).
pub const DEFAULT_TTL_SECS: u64 = 15;

#[derive(Debug, Clone)]
struct Lease {
    gateid: String,
    expires_at: DateTime<FixedOffset>,
}

/// A live lease view returned by `inspect`
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationView {
    pub gateid: String,
    pub remaining_secs: i64,
}

/// Keyed TTL map `slotid → (gateid, expires_at)`
pub struct ReservationRegistry {
    leases: DashMap<String, Lease>,
}

pub type SharedReservationRegistry = Arc<ReservationRegistry>;

impl ReservationRegistry {
    pub fn new() -> Self {
        Self {
            leases: DashMap::new(),
        }
    }

    pub fn shared() -> SharedReservationRegistry {
        Arc::new(Self::new())
    }

    /// Take or refresh a lease. Fails with Conflict while a live lease is
    /// held by a different gate; the same gate may always re-reserve.
    pub fn reserve(&self, gateid: &str, slotid: &str, ttl_secs: u64) -> DomainResult<()> {
        self.reserve_at(gateid, slotid, ttl_secs, time::now())
    }

    fn reserve_at(
        &self,
        gateid: &str,
        slotid: &str,
        ttl_secs: u64,
        now: DateTime<FixedOffset>,
    ) -> DomainResult<()> {
        // entry() holds the shard lock, making check-and-set atomic
        let mut entry = self
            .leases
            .entry(slotid.to_string())
            .or_insert_with(|| Lease {
                gateid: gateid.to_string(),
                expires_at: now,
            });

        let live = entry.expires_at > now;
        if live && entry.gateid != gateid {
            return Err(DomainError::Conflict(format!(
                "Slot {} held by gate {}",
                slotid, entry.gateid
            )));
        }

        entry.gateid = gateid.to_string();
        entry.expires_at = now + Duration::seconds(ttl_secs as i64);
        debug!(gateid, slotid, ttl_secs, "Reservation set");
        Ok(())
    }

    /// Current live owner, if any.
    pub fn owner(&self, slotid: &str) -> Option<String> {
        self.inspect(slotid).map(|v| v.gateid)
    }

    /// Live lease for a slot with remaining TTL, or None.
    pub fn inspect(&self, slotid: &str) -> Option<ReservationView> {
        self.inspect_at(slotid, time::now())
    }

    fn inspect_at(&self, slotid: &str, now: DateTime<FixedOffset>) -> Option<ReservationView> {
        let lease = self.leases.get(slotid)?;
        let remaining = (lease.expires_at - now).num_seconds();
        if remaining <= 0 {
            return None;
        }
        Some(ReservationView {
            gateid: lease.gateid.clone(),
            remaining_secs: remaining,
        })
    }

    /// Unconditional release.
    pub fn release(&self, slotid: &str) {
        if self.leases.remove(slotid).is_some() {
            debug!(slotid, "Reservation released");
        }
    }

    /// Drop expired entries. Liveness never depends on this running; it just
    /// keeps the map from accumulating dead leases.
    pub fn sweep(&self) -> usize {
        self.sweep_at(time::now())
    }

    fn sweep_at(&self, now: DateTime<FixedOffset>) -> usize {
        let before = self.leases.len();
        self.leases.retain(|_, lease| lease.expires_at > now);
        before - self.leases.len()
    }

    /// Number of stored leases (live or awaiting sweep)
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}

impl Default for ReservationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the periodic reservation sweep task. The handle is registered
/// with the shutdown coordinator so process exit waits for the sweeper.
pub fn start_reservation_sweeper(
    registry: SharedReservationRegistry,
    shutdown: ShutdownSignal,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval = interval_secs, "Reservation sweeper started");

        let mut interval = tokio::time::interval(TokioDuration::from_secs(interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let dropped = registry.sweep();
                    if dropped > 0 {
                        warn!(dropped, "Expired reservations swept");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Reservation sweeper shutting down");
                    break;
                }
            }
        }
    })
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        time::now()
    }

    #[test]
    fn reserve_then_inspect() {
        let reg = ReservationRegistry::new();
        reg.reserve("G_A", "D4", 15).unwrap();

        let view = reg.inspect("D4").unwrap();
        assert_eq!(view.gateid, "G_A");
        assert!(view.remaining_secs > 0 && view.remaining_secs <= 15);
    }

    #[test]
    fn foreign_live_lease_conflicts() {
        let reg = ReservationRegistry::new();
        reg.reserve("G_A", "D4", 15).unwrap();

        let err = reg.reserve("G_B", "D4", 15).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(err.to_string().contains("G_A"));
    }

    #[test]
    fn same_gate_refreshes_lease() {
        let reg = ReservationRegistry::new();
        reg.reserve("G_A", "D4", 5).unwrap();
        reg.reserve("G_A", "D4", 15).unwrap();
        let view = reg.inspect("D4").unwrap();
        assert!(view.remaining_secs > 5);
    }

    #[test]
    fn expired_lease_is_claimable() {
        let reg = ReservationRegistry::new();
        let t0 = now();
        reg.reserve_at("G_A", "D4", 15, t0).unwrap();

        // Within TTL gate B is refused
        let within = t0 + Duration::seconds(10);
        assert!(reg.reserve_at("G_B", "D4", 15, within).is_err());

        // After TTL the lease has silently expired — any gate may claim
        let after = t0 + Duration::seconds(16);
        assert_eq!(reg.inspect_at("D4", after), None);
        reg.reserve_at("G_B", "D4", 15, after).unwrap();
        assert_eq!(reg.inspect_at("D4", after).unwrap().gateid, "G_B");
    }

    #[test]
    fn release_is_unconditional() {
        let reg = ReservationRegistry::new();
        reg.reserve("G_A", "D4", 15).unwrap();
        reg.release("D4");
        assert_eq!(reg.inspect("D4"), None);
        reg.release("D4"); // releasing again is fine
    }

    #[test]
    fn sweep_drops_only_expired() {
        let reg = ReservationRegistry::new();
        let t0 = now();
        reg.reserve_at("G_A", "D1", 5, t0).unwrap();
        reg.reserve_at("G_B", "D2", 60, t0).unwrap();

        let dropped = reg.sweep_at(t0 + Duration::seconds(10));
        assert_eq!(dropped, 1);
        assert_eq!(reg.len(), 1);
        assert!(reg.inspect_at("D2", t0 + Duration::seconds(10)).is_some());
    }

    #[test]
    fn owner_of_unreserved_slot_is_none() {
        let reg = ReservationRegistry::new();
        assert_eq!(reg.owner("Z9"), None);
    }
}
