//! Per-gate WebSocket sessions (`/ws/gate/{gateid}`)
//!
//! Each session forwards everything published on the event bus to its gate
//! and dispatches the gate's own frames: heartbeats touch `last_sync` and
//! are re-broadcast, pings are answered on the same session, sync_events are
//! re-broadcast to every gate. Delivery is at-most-once; a failed send ends
//! the session and the client reconnects.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::events::BusMessage;
use crate::application::session::RegisterResult;
use crate::interfaces::http::router::CloudState;
use crate::support::time;

/// WebSocket upgrade handler for gate sessions
pub async fn ws_gate_handler(
    ws: WebSocketUpgrade,
    Path(gateid): Path<String>,
    State(state): State<CloudState>,
) -> impl IntoResponse {
    let gateid = gateid.trim().to_uppercase();
    info!(gateid = gateid.as_str(), "Gate WebSocket connecting");
    ws.on_upgrade(move |socket| handle_gate_socket(socket, state, gateid))
}

async fn handle_gate_socket(socket: WebSocket, state: CloudState, gateid: String) {
    let (mut sender, mut receiver) = socket.split();

    // The session's private outbound lane (pongs, direct sends). Dropping
    // the registered sender on eviction closes this lane and ends the loop.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection_id = match state.sessions.register(&gateid, tx.clone()) {
        RegisterResult::New { connection_id } => connection_id,
        RegisterResult::Evicted { connection_id } => connection_id,
    };

    let mut subscriber = state.bus.subscribe();

    loop {
        select! {
            direct = rx.recv() => {
                match direct {
                    Some(text) => {
                        if let Err(e) = sender.send(Message::Text(text.into())).await {
                            warn!(gateid = gateid.as_str(), error = %e, "Direct send failed");
                            break;
                        }
                    }
                    // Sender dropped — this session was evicted
                    None => break,
                }
            }

            frame = subscriber.recv() => {
                match frame {
                    Some(msg) => {
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if let Err(e) = sender.send(Message::Text(json.into())).await {
                                    warn!(gateid = gateid.as_str(), error = %e, "Broadcast send failed");
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "Frame serialization failed"),
                        }
                    }
                    None => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_gate_frame(&state, &gateid, &tx, &text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(gateid = gateid.as_str(), "Gate sent close");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(gateid = gateid.as_str(), error = %e, "WebSocket error");
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
        }
    }

    state.sessions.unregister(&gateid, connection_id);
    info!(gateid = gateid.as_str(), connection_id, "Gate WebSocket disconnected");
}

/// Dispatch one gate-originated frame
async fn handle_gate_frame(
    state: &CloudState,
    gateid: &str,
    tx: &mpsc::UnboundedSender<String>,
    raw: &str,
) {
    let parsed: Result<BusMessage, _> = serde_json::from_str(raw);
    let msg = match parsed {
        Ok(msg) => msg,
        Err(_) => {
            warn!(gateid, raw, "Unknown frame from gate");
            return;
        }
    };

    state.sessions.touch(gateid);

    match msg {
        BusMessage::Heartbeat { .. } => {
            // The path parameter is authoritative for which row to touch
            if let Err(e) = state.repos.gates().touch_last_sync(gateid).await {
                debug!(gateid, error = %e, "Heartbeat for unknown gate");
            }
            state.bus.publish(BusMessage::Heartbeat {
                gate: gateid.to_string(),
            });
        }

        BusMessage::Ping { ts, .. } => {
            let pong = BusMessage::Pong {
                gate: gateid.to_string(),
                ts: Some(ts),
                server_ts: time::now().timestamp_millis(),
            };
            if let Ok(json) = serde_json::to_string(&pong) {
                let _ = tx.send(json);
            }
        }

        BusMessage::SyncEvent { event } => {
            // Replay of a queued gate event: re-broadcast the inner frame so
            // peers see it early. The authoritative effect still comes from
            // the HTTP mutation path.
            match serde_json::from_value::<BusMessage>(event) {
                Ok(inner) => state.bus.publish(inner),
                Err(_) => debug!(gateid, "sync_event carried a non-frame payload"),
            }
        }

        other => {
            debug!(gateid, message_type = other.message_type(), "Ignoring frame");
        }
    }
}
