//! A single gate WebSocket session

use chrono::{DateTime, FixedOffset};
use tokio::sync::mpsc;

use crate::support::time;

/// Live connection to one gate. The sender feeds the session's write task;
/// dropping it ends that task.
pub struct Connection {
    pub connection_id: u64,
    pub gateid: String,
    sender: mpsc::UnboundedSender<String>,
    pub connected_at: DateTime<FixedOffset>,
    pub last_activity: DateTime<FixedOffset>,
}

impl Connection {
    pub fn new(connection_id: u64, gateid: &str, sender: mpsc::UnboundedSender<String>) -> Self {
        let now = time::now();
        Self {
            connection_id,
            gateid: gateid.to_string(),
            sender,
            connected_at: now,
            last_activity: now,
        }
    }

    pub fn send(&self, message: String) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| format!("Gate {} session channel closed", self.gateid))
    }

    pub fn touch(&mut self) {
        self.last_activity = time::now();
    }
}
