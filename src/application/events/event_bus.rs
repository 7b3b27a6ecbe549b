//! Realtime fan-out to the open gate sessions.
//!
//! The bus is deliberately shallow. Delivery is at-most-once and every gate
//! reconverges through the snapshot puller, so a deep buffer would only
//! delay the moment a stalled session falls back to snapshot state. Frames
//! a session misses are counted into the metrics sink, never replayed.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::types::BusMessage;

/// Enough to ride out one stalled socket write during a burst of slot
/// traffic; a session further behind than this is snapshot territory.
const FRAME_BUFFER: usize = 256;

/// Broadcast side of the realtime channel. Cloning is cheap; the mutation
/// engine and every WebSocket session share one bus.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusMessage>,
}

/// Shared event bus type
pub type SharedEventBus = Arc<EventBus>;

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FRAME_BUFFER);
        Self { sender }
    }

    /// Wrap in `Arc` for shared ownership
    pub fn shared() -> SharedEventBus {
        Arc::new(Self::new())
    }

    #[cfg(test)]
    fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a frame to every open session. No sessions is a normal state
    /// (all gates offline); the frame simply ages out of the buffer.
    pub fn publish(&self, message: BusMessage) {
        metrics::counter!("parkwatch_bus_frames_total", "type" => message.message_type())
            .increment(1);

        match self.sender.send(message) {
            Ok(sessions) => debug!(sessions, "Frame published"),
            Err(broadcast::error::SendError(msg)) => {
                debug!(
                    message_type = msg.message_type(),
                    "Frame published with no sessions open"
                );
            }
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
            missed: 0,
        }
    }

    /// Live subscribers (open gate sessions, plus any test taps)
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One session's tap on the bus.
///
/// Frames overwritten while the session was stalled are skipped, not
/// replayed: the count goes to the metrics sink, and the gate's next
/// snapshot pull carries the state those frames described.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<BusMessage>,
    missed: u64,
}

impl EventSubscriber {
    /// Next frame, or None once the bus is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.missed += n;
                    metrics::counter!("parkwatch_bus_missed_frames_total").increment(n);
                    warn!(
                        missed = n,
                        session_total = self.missed,
                        "Session fell behind the bus; snapshot pull will reconverge it"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Frames this subscriber never saw
    pub fn missed(&self) -> u64 {
        self.missed
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        bus.publish(BusMessage::Heartbeat { gate: "G_N".into() });

        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.message_type(), "heartbeat");
        assert_eq!(sub.missed(), 0);
    }

    #[tokio::test]
    async fn all_subscribers_receive() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(BusMessage::SlotUpdate {
            slot_id: "A1".into(),
            occupied: true,
            plate: Some("P1".into()),
        });

        assert_eq!(a.recv().await.unwrap().message_type(), "slot_update");
        assert_eq!(b.recv().await.unwrap().message_type(), "slot_update");
    }

    #[tokio::test]
    async fn stalled_subscriber_skips_and_counts_missed_frames() {
        let bus = EventBus::with_capacity(1);
        let mut sub = bus.subscribe();

        // Three frames into a one-slot buffer while the session is stalled
        for slot in ["A1", "B2", "C3"] {
            bus.publish(BusMessage::SlotUpdate {
                slot_id: slot.into(),
                occupied: true,
                plate: Some("P1".into()),
            });
        }

        // Only the newest frame survives; the overwritten ones are counted
        let msg = sub.recv().await.unwrap();
        match msg {
            BusMessage::SlotUpdate { slot_id, .. } => assert_eq!(slot_id, "C3"),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(sub.missed(), 2);
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(BusMessage::Heartbeat { gate: "G_N".into() });
    }
}
