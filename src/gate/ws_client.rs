//! WebSocket client for the realtime channel to the Cloud.
//!
//! Reconnects forever with a short backoff. While connected it runs the
//! heartbeat (~4 s) and ping (~5 s) loops, forwards outbound frames handed
//! in through [`WsHandle`], applies incoming slot updates to the local
//! store, and records measured RTTs. Losing the channel costs nothing
//! durable — the reconciler carries correctness.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::application::events::BusMessage;
use crate::gate::store::{GateLocalStore, STATE_LAST_RTT_MS};
use crate::support::shutdown::ShutdownSignal;
use crate::support::time;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(4);
const PING_INTERVAL: Duration = Duration::from_secs(5);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(3);

/// Handle for sending frames out on the gate's WebSocket session.
/// Sends are best-effort: a disconnected client drops them.
#[derive(Clone)]
pub struct WsHandle {
    tx: mpsc::UnboundedSender<BusMessage>,
}

impl WsHandle {
    /// Queue a frame for the session; false when the client task is gone.
    pub fn send(&self, message: BusMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    /// A handle wired to nowhere, for tests and WS-less operation.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }
}

/// Derive `ws://…/ws/gate/{gateid}` from the configured Cloud API base.
fn ws_url(cloud_api: &str, gate_id: &str) -> String {
    let base = cloud_api
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{}/ws/gate/{}", base.trim_end_matches('/'), gate_id)
}

/// Spawn the reconnecting WebSocket client; returns the outbound handle
/// and the task handle for the shutdown coordinator.
pub fn start_ws_client(
    cloud_api: &str,
    gate_id: &str,
    store: Arc<GateLocalStore>,
    shutdown: ShutdownSignal,
) -> (WsHandle, tokio::task::JoinHandle<()>) {
    let url = ws_url(cloud_api, gate_id);
    let gate_id = gate_id.to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<BusMessage>();

    let task = tokio::spawn(async move {
        loop {
            if shutdown.is_triggered() {
                break;
            }

            info!(url = url.as_str(), "Connecting gate WebSocket");
            match connect_async(url.as_str()).await {
                Ok((socket, _)) => {
                    info!("Gate WebSocket connected");
                    run_session(socket, &gate_id, &store, &mut rx, &shutdown).await;
                    warn!("Gate WebSocket disconnected");
                }
                Err(e) => {
                    debug!(error = %e, "Gate WebSocket connect failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                _ = shutdown.wait() => break,
            }
        }
        info!("Gate WebSocket client stopped");
    });

    (WsHandle { tx }, task)
}

async fn run_session<S>(
    socket: tokio_tungstenite::WebSocketStream<S>,
    gate_id: &str,
    store: &GateLocalStore,
    rx: &mut mpsc::UnboundedReceiver<BusMessage>,
    shutdown: &ShutdownSignal,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut ping = tokio::time::interval(PING_INTERVAL);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let frame = BusMessage::Heartbeat { gate: gate_id.to_string() };
                if send_frame(&mut sink, &frame).await.is_err() {
                    return;
                }
            }

            _ = ping.tick() => {
                let frame = BusMessage::Ping {
                    gate: gate_id.to_string(),
                    ts: time::now().timestamp_millis(),
                };
                if send_frame(&mut sink, &frame).await.is_err() {
                    return;
                }
            }

            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if send_frame(&mut sink, &frame).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming(gate_id, store, &text).await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket receive error");
                        return;
                    }
                    _ => {}
                }
            }

            _ = shutdown.wait() => {
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

async fn send_frame<Sink>(sink: &mut Sink, frame: &BusMessage) -> Result<(), ()>
where
    Sink: SinkExt<Message> + Unpin,
{
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Frame serialization failed");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Dispatch one Cloud-originated frame.
async fn handle_incoming(gate_id: &str, store: &GateLocalStore, raw: &str) {
    let msg: BusMessage = match serde_json::from_str(raw) {
        Ok(msg) => msg,
        Err(_) => {
            debug!(raw, "Unknown frame from cloud");
            return;
        }
    };

    match msg {
        BusMessage::Pong { ts, .. } => {
            if let Some(sent) = ts {
                let rtt = time::now().timestamp_millis() - sent;
                debug!(rtt_ms = rtt, "RTT measured");
                if let Err(e) = store.set_state(STATE_LAST_RTT_MS, &rtt.to_string()).await {
                    debug!(error = %e, "Failed to record RTT");
                }
            }
        }

        BusMessage::SlotUpdate {
            slot_id,
            occupied,
            plate,
        } => {
            // Realtime view only; the snapshot puller remains the source of
            // truth for version and any missed frames
            if let Err(e) = store
                .apply_remote(&slot_id, occupied, plate.as_deref())
                .await
            {
                warn!(slot_id = slot_id.as_str(), error = %e, "Failed to apply slot update");
            }
        }

        BusMessage::Heartbeat { gate } => {
            if gate != gate_id {
                debug!(peer = gate.as_str(), "Peer gate is up");
            }
        }

        other => {
            debug!(message_type = other.message_type(), "Frame received");
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_from_http_base() {
        assert_eq!(
            ws_url("http://cloud_api:8010", "G_N"),
            "ws://cloud_api:8010/ws/gate/G_N"
        );
        assert_eq!(
            ws_url("https://yard.example.com/", "G_S"),
            "wss://yard.example.com/ws/gate/G_S"
        );
    }

    #[test]
    fn disconnected_handle_drops_sends() {
        let handle = WsHandle::disconnected();
        // No receiver: send reports failure but must not panic
        assert!(!handle.send(BusMessage::Heartbeat { gate: "G_N".into() }));
    }

    #[tokio::test]
    async fn incoming_slot_update_applies_to_store() {
        let store = GateLocalStore::open_in_memory().await.unwrap();
        store.ensure_slot("A1").await.unwrap();

        handle_incoming(
            "G_N",
            &store,
            r#"{"type":"slot_update","slotId":"A1","occupied":true,"plate":"P1"}"#,
        )
        .await;

        let s = store.get_slot("A1").await.unwrap().unwrap();
        assert!(s.occupied);
        assert_eq!(s.plate.as_deref(), Some("P1"));
    }

    #[tokio::test]
    async fn incoming_pong_records_rtt() {
        let store = GateLocalStore::open_in_memory().await.unwrap();
        let sent = time::now().timestamp_millis() - 25;

        handle_incoming(
            "G_N",
            &store,
            &format!(
                r#"{{"type":"pong","gate":"G_N","ts":{},"server_ts":0}}"#,
                sent
            ),
        )
        .await;

        let rtt: i64 = store
            .get_state(STATE_LAST_RTT_MS)
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        assert!(rtt >= 25);
    }

    #[tokio::test]
    async fn garbage_frame_is_ignored() {
        let store = GateLocalStore::open_in_memory().await.unwrap();
        handle_incoming("G_N", &store, "not json at all").await;
    }
}
