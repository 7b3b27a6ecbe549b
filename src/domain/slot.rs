//! Slot domain entity
//!
//! Invariants: `occupied ⇔ plate != None`, and `version` increments by
//! exactly one on every mutation. `(x, y)` is a grid coordinate used only
//! for nearest-gate distance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainResult;

/// Individually addressable parking space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub slotid: String,
    pub zone: String,
    pub x: f64,
    pub y: f64,
    pub occupied: bool,
    pub plate: Option<String>,
    pub version: i32,
}

impl Slot {
    /// A fresh, free slot at the given grid position.
    pub fn new(slotid: impl Into<String>, zone: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            slotid: slotid.into(),
            zone: zone.into(),
            x,
            y,
            occupied: false,
            plate: None,
            version: 0,
        }
    }

    /// Euclidean distance to a point (a gate's grid position).
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }

    /// The occupancy invariant: `occupied ⇔ plate != None`.
    pub fn occupancy_consistent(&self) -> bool {
        self.occupied == self.plate.is_some()
    }
}

#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// All slots ordered by slotid
    async fn find_all(&self) -> DomainResult<Vec<Slot>>;

    async fn find_by_id(&self, slotid: &str) -> DomainResult<Option<Slot>>;

    /// Insert a new free slot; Conflict if the slotid is taken.
    async fn insert(&self, slot: Slot) -> DomainResult<()>;

    /// Edit geometry/zone only. Occupancy moves only through the
    /// mutation engine.
    async fn update_geometry(&self, slotid: &str, zone: &str, x: f64, y: f64)
        -> DomainResult<()>;

    /// Delete a slot; Conflict when occupied.
    async fn delete(&self, slotid: &str) -> DomainResult<()>;
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_is_free_and_consistent() {
        let s = Slot::new("A1", "A", 0.0, 0.0);
        assert!(!s.occupied);
        assert!(s.plate.is_none());
        assert_eq!(s.version, 0);
        assert!(s.occupancy_consistent());
    }

    #[test]
    fn distance_is_euclidean() {
        let s = Slot::new("A1", "A", 3.0, 4.0);
        assert!((s.distance_to(0.0, 0.0) - 5.0).abs() < f64::EPSILON);
        assert!((s.distance_to(3.0, 4.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn occupancy_consistency_detects_violation() {
        let mut s = Slot::new("A1", "A", 0.0, 0.0);
        s.occupied = true; // plate still None
        assert!(!s.occupancy_consistent());
        s.plate = Some("51H-123.45".into());
        assert!(s.occupancy_consistent());
    }
}
