//! Vehicle domain entity
//!
//! One row per park cycle. Open = `time_out IS NULL`; yard uniqueness says
//! each plate has at most one open row.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A vehicle's presence in the yard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i32,
    pub plate: String,
    pub slotid: String,
    /// Entry gate
    pub gateid: String,
    pub time_in: DateTime<FixedOffset>,
    pub time_out: Option<DateTime<FixedOffset>>,
}

impl Vehicle {
    pub fn is_open(&self) -> bool {
        self.time_out.is_none()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::time;

    #[test]
    fn open_until_time_out_set() {
        let mut v = Vehicle {
            id: 1,
            plate: "51H-123.45".into(),
            slotid: "A1".into(),
            gateid: "G_N".into(),
            time_in: time::now(),
            time_out: None,
        };
        assert!(v.is_open());
        v.time_out = Some(time::now());
        assert!(!v.is_open());
    }
}
