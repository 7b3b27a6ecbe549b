//! Event bus wire messages
//!
//! One tagged enum covers every frame on the gate channel, dispatched in a
//! single place rather than per-handler polymorphism. Shapes are the wire
//! contract the gates parse; the `slotId` casing is deliberate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A frame on the Cloud↔Gate realtime channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
    /// Gate→Cloud liveness beacon (~4 s); re-broadcast so peers learn which
    /// gates are up
    Heartbeat { gate: String },

    /// Gate→Cloud RTT probe
    Ping { gate: String, ts: i64 },

    /// Cloud→Gate RTT answer
    Pong {
        gate: String,
        ts: Option<i64>,
        server_ts: i64,
    },

    /// Gate→Cloud opportunistic replay of a locally-queued event; the inner
    /// payload is re-broadcast verbatim
    SyncEvent { event: Value },

    /// Cloud→Gate slot occupancy change
    SlotUpdate {
        #[serde(rename = "slotId")]
        slot_id: String,
        occupied: bool,
        plate: Option<String>,
    },

    /// Cloud→Gate committed vehicle entry
    VehicleIn {
        plate: String,
        slot: String,
        gate: String,
    },

    /// Cloud→Gate committed vehicle exit
    VehicleOut {
        plate: String,
        slot: Option<String>,
        gate: Option<String>,
    },
}

impl BusMessage {
    /// Wire discriminator, for logs and metrics
    pub fn message_type(&self) -> &'static str {
        match self {
            BusMessage::Heartbeat { .. } => "heartbeat",
            BusMessage::Ping { .. } => "ping",
            BusMessage::Pong { .. } => "pong",
            BusMessage::SyncEvent { .. } => "sync_event",
            BusMessage::SlotUpdate { .. } => "slot_update",
            BusMessage::VehicleIn { .. } => "vehicle_in",
            BusMessage::VehicleOut { .. } => "vehicle_out",
        }
    }

    /// Originating gate, when the frame carries one
    pub fn gate(&self) -> Option<&str> {
        match self {
            BusMessage::Heartbeat { gate }
            | BusMessage::Ping { gate, .. }
            | BusMessage::Pong { gate, .. }
            | BusMessage::VehicleIn { gate, .. } => Some(gate),
            BusMessage::VehicleOut { gate, .. } => gate.as_deref(),
            _ => None,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn heartbeat_wire_shape() {
        let msg = BusMessage::Heartbeat { gate: "G_N".into() };
        let v: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(v, json!({"type": "heartbeat", "gate": "G_N"}));
    }

    #[test]
    fn slot_update_uses_camel_case_slot_id() {
        let msg = BusMessage::SlotUpdate {
            slot_id: "A1".into(),
            occupied: true,
            plate: Some("51H-123.45".into()),
        };
        let v: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "slot_update");
        assert_eq!(v["slotId"], "A1");
        assert_eq!(v["occupied"], true);
        assert_eq!(v["plate"], "51H-123.45");
    }

    #[test]
    fn ping_pong_roundtrip() {
        let raw = r#"{"type":"ping","gate":"G_S","ts":1700000000000}"#;
        let msg: BusMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            BusMessage::Ping {
                gate: "G_S".into(),
                ts: 1_700_000_000_000,
            }
        );

        let pong = BusMessage::Pong {
            gate: "G_S".into(),
            ts: Some(1_700_000_000_000),
            server_ts: 1_700_000_000_123,
        };
        let v: Value = serde_json::to_value(&pong).unwrap();
        assert_eq!(v["type"], "pong");
        assert_eq!(v["server_ts"], 1_700_000_000_123i64);
    }

    #[test]
    fn sync_event_carries_payload_verbatim() {
        let raw = json!({
            "type": "sync_event",
            "event": {
                "type": "vehicle_in",
                "event_id": "e1",
                "plate": "P3",
                "slot": "C3",
                "gate": "G_N"
            }
        });
        let msg: BusMessage = serde_json::from_value(raw.clone()).unwrap();
        match &msg {
            BusMessage::SyncEvent { event } => {
                assert_eq!(event["event_id"], "e1");
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert_eq!(serde_json::to_value(&msg).unwrap(), raw);
    }

    #[test]
    fn vehicle_out_allows_null_slot() {
        let raw = r#"{"type":"vehicle_out","plate":"P1","slot":null,"gate":"G_N"}"#;
        let msg: BusMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            BusMessage::VehicleOut {
                plate: "P1".into(),
                slot: None,
                gate: Some("G_N".into()),
            }
        );
    }

    #[test]
    fn message_type_matches_tag() {
        let msg = BusMessage::VehicleIn {
            plate: "P1".into(),
            slot: "A1".into(),
            gate: "G_N".into(),
        };
        let v: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], msg.message_type());
    }
}
