//! Gate domain entity
//!
//! A gate is a physical entry/exit point. The row is immutable except for
//! `last_sync`, which heartbeats touch; a gate is online while its last
//! heartbeat is younger than 60 seconds.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::domain::DomainResult;
use crate::support::time;

/// Seconds without a heartbeat after which a gate counts as offline.
pub const ONLINE_WINDOW_SECS: i64 = 60;

/// Role attached to a gate's operator station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateRole {
    Admin,
    Guard,
}

impl GateRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Guard => "guard",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            _ => Self::Guard,
        }
    }
}

impl std::fmt::Display for GateRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical entry/exit point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub gateid: String,
    /// Grid coordinate, used only for nearest-slot distance
    pub x: f64,
    pub y: f64,
    /// Touched on every heartbeat
    pub last_sync: Option<DateTime<FixedOffset>>,
    pub role: GateRole,
}

impl Gate {
    /// Online = heartbeat seen within the last 60 seconds.
    pub fn is_online(&self) -> bool {
        self.is_online_at(time::now())
    }

    pub fn is_online_at(&self, now: DateTime<FixedOffset>) -> bool {
        match self.last_sync {
            Some(ts) => (now - ts).num_seconds() < ONLINE_WINDOW_SECS,
            None => false,
        }
    }
}

#[async_trait]
pub trait GateRepository: Send + Sync {
    /// All gates ordered by gateid
    async fn find_all(&self) -> DomainResult<Vec<Gate>>;

    async fn find_by_id(&self, gateid: &str) -> DomainResult<Option<Gate>>;

    async fn save(&self, gate: Gate) -> DomainResult<()>;

    /// Touch `last_sync` to now. Runs outside mutation transactions so
    /// heartbeats never contend with vehicle_in/vehicle_out.
    async fn touch_last_sync(&self, gateid: &str) -> DomainResult<()>;

    async fn delete(&self, gateid: &str) -> DomainResult<()>;
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn gate_with_last_sync(secs_ago: i64) -> Gate {
        Gate {
            gateid: "G_N".into(),
            x: 0.0,
            y: 0.0,
            last_sync: Some(time::now() - Duration::seconds(secs_ago)),
            role: GateRole::Guard,
        }
    }

    #[test]
    fn recent_heartbeat_is_online() {
        assert!(gate_with_last_sync(5).is_online());
    }

    #[test]
    fn stale_heartbeat_is_offline() {
        assert!(!gate_with_last_sync(61).is_online());
    }

    #[test]
    fn online_window_boundary() {
        let gate = gate_with_last_sync(0);
        let later = gate.last_sync.unwrap() + Duration::seconds(ONLINE_WINDOW_SECS);
        assert!(!gate.is_online_at(later));
        assert!(gate.is_online_at(later - Duration::seconds(1)));
    }

    #[test]
    fn never_synced_is_offline() {
        let gate = Gate {
            gateid: "G_S".into(),
            x: 1.0,
            y: 1.0,
            last_sync: None,
            role: GateRole::Admin,
        };
        assert!(!gate.is_online());
    }

    #[test]
    fn role_roundtrip() {
        assert_eq!(GateRole::from_str("admin"), GateRole::Admin);
        assert_eq!(GateRole::from_str("guard"), GateRole::Guard);
        assert_eq!(GateRole::from_str("anything"), GateRole::Guard);
        assert_eq!(GateRole::Admin.as_str(), "admin");
    }
}
