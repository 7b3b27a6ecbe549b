//! Session registry — the set of currently open gate WebSocket sessions
//!
//! One owner for the active-gates set: sessions register/unregister
//! themselves; everyone else only reads snapshots (connected ids, counts).

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::connection::Connection;

/// Outcome of a registration attempt
pub enum RegisterResult {
    /// Fresh connection — no previous session existed
    New { connection_id: u64 },
    /// Replaced an existing session (old sender was dropped)
    Evicted { connection_id: u64 },
}

/// Thread-safe registry of active gate sessions
pub struct GateSessionRegistry {
    sessions: DashMap<String, Connection>,
    /// Monotonically increasing connection ID counter
    next_connection_id: AtomicU64,
}

/// Shared, reference-counted session registry
pub type SharedGateSessionRegistry = Arc<GateSessionRegistry>;

impl GateSessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Wrap in `Arc` for shared ownership
    pub fn shared() -> SharedGateSessionRegistry {
        Arc::new(Self::new())
    }

    /// Register a gate connection. An existing session for the same gate is
    /// evicted: its sender is dropped, which stops its write task.
    pub fn register(
        &self,
        gateid: &str,
        sender: mpsc::UnboundedSender<String>,
    ) -> RegisterResult {
        let evicted = self.sessions.remove(gateid).map(|(_, old)| {
            warn!(
                gateid,
                connected_since = %old.connected_at,
                "Evicting stale gate session — new connection replaces old"
            );
        });

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        info!(gateid, connection_id, "Registering gate session");
        self.sessions
            .insert(gateid.to_string(), Connection::new(connection_id, gateid, sender));

        metrics::gauge!("parkwatch_connected_gates").set(self.sessions.len() as f64);

        match evicted {
            Some(()) => RegisterResult::Evicted { connection_id },
            None => RegisterResult::New { connection_id },
        }
    }

    /// Unregister a gate session. Only removes it if `connection_id` matches
    /// the current session, so an evicted connection's cleanup cannot remove
    /// its replacement.
    pub fn unregister(&self, gateid: &str, connection_id: u64) {
        let removed = self
            .sessions
            .remove_if(gateid, |_, conn| conn.connection_id == connection_id);
        if removed.is_some() {
            metrics::gauge!("parkwatch_connected_gates").set(self.sessions.len() as f64);
            info!(gateid, connection_id, "Unregistered gate session");
        }
    }

    /// Send a frame to one gate
    pub fn send_to(&self, gateid: &str, message: String) -> Result<(), String> {
        match self.sessions.get(gateid) {
            Some(conn) => conn.send(message),
            None => Err(format!("Gate {} not connected", gateid)),
        }
    }

    /// Update last activity for a gate
    pub fn touch(&self, gateid: &str) {
        if let Some(mut conn) = self.sessions.get_mut(gateid) {
            conn.touch();
        }
    }

    pub fn is_connected(&self, gateid: &str) -> bool {
        self.sessions.contains_key(gateid)
    }

    /// All connected gate ids
    pub fn connected_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of active sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for GateSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_sender() -> mpsc::UnboundedSender<String> {
        let (tx, _rx) = mpsc::unbounded_channel();
        tx
    }

    #[test]
    fn register_new_session() {
        let reg = GateSessionRegistry::new();
        let result = reg.register("G_N", make_sender());
        assert!(matches!(result, RegisterResult::New { .. }));
        assert_eq!(reg.count(), 1);
        assert!(reg.is_connected("G_N"));
    }

    #[test]
    fn register_evicts_existing_session() {
        let reg = GateSessionRegistry::new();
        reg.register("G_N", make_sender());
        let result = reg.register("G_N", make_sender());
        assert!(matches!(result, RegisterResult::Evicted { .. }));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn unregister_removes_session() {
        let reg = GateSessionRegistry::new();
        let result = reg.register("G_N", make_sender());
        let conn_id = match result {
            RegisterResult::New { connection_id } => connection_id,
            _ => panic!("expected New"),
        };
        reg.unregister("G_N", conn_id);
        assert_eq!(reg.count(), 0);
        assert!(!reg.is_connected("G_N"));
    }

    #[test]
    fn unregister_nonexistent_is_noop() {
        let reg = GateSessionRegistry::new();
        reg.unregister("G_UNKNOWN", 999); // should not panic
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn evicted_session_cleanup_does_not_remove_new_session() {
        let reg = GateSessionRegistry::new();
        let old_conn_id = match reg.register("G_N", make_sender()) {
            RegisterResult::New { connection_id } => connection_id,
            _ => panic!("expected New"),
        };

        let new_conn_id = match reg.register("G_N", make_sender()) {
            RegisterResult::Evicted { connection_id } => connection_id,
            _ => panic!("expected Evicted"),
        };

        // Old connection's cleanup tries to unregister — must be a no-op
        reg.unregister("G_N", old_conn_id);
        assert_eq!(reg.count(), 1);
        assert!(reg.is_connected("G_N"));

        reg.unregister("G_N", new_conn_id);
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn send_to_connected_gate() {
        let reg = GateSessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.register("G_N", tx);

        reg.send_to("G_N", "hello".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hello");
    }

    #[test]
    fn send_to_disconnected_returns_error() {
        let reg = GateSessionRegistry::new();
        assert!(reg.send_to("G_UNKNOWN", "msg".into()).is_err());
    }

    #[test]
    fn connected_ids() {
        let reg = GateSessionRegistry::new();
        reg.register("G_N", make_sender());
        reg.register("G_S", make_sender());
        let mut ids = reg.connected_ids();
        ids.sort();
        assert_eq!(ids, vec!["G_N", "G_S"]);
    }
}
