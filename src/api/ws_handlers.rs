//! WebSocket handler for the real-time sync channel

use super::handlers::NotesState;
use crate::ws::protocol::encode_frame;
use crate::ws::{OutgoingEvent, WsSession};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, warn};

/// WebSocket upgrade handler for `/ws`
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<NotesState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Serialize and send a batch of events; `false` once the client is gone
async fn send_events(sender: &mut SplitSink<WebSocket, Message>, events: &[OutgoingEvent]) -> bool {
    match encode_frame(events) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize outgoing frame: {}", e);
            true
        }
    }
}

/// Handle an individual WebSocket connection
async fn handle_ws(socket: WebSocket, state: NotesState) {
    let ctx = state.sync.clone();
    let (id, mut outbound) = ctx.registry.connect().await;
    let mut session = WsSession::new(id, ctx.clone());

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut ping_interval = interval(Duration::from_secs(ctx.config.ws_ping_secs.max(1)));
    // Skip the first immediate tick
    ping_interval.tick().await;

    loop {
        tokio::select! {
            // Changes pushed by other sessions
            Some(events) = outbound.recv() => {
                if !send_events(&mut ws_sender, &events).await {
                    debug!(session = %id, "WebSocket send failed, client disconnected");
                    break;
                }
            }

            _ = ping_interval.tick() => {
                if ws_sender.send(Message::Ping(vec![].into())).await.is_err() {
                    debug!(session = %id, "Ping failed, client disconnected");
                    break;
                }
            }

            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match session.receive(text.as_str()).await {
                            Ok(events) => {
                                if !events.is_empty() && !send_events(&mut ws_sender, &events).await {
                                    break;
                                }
                            }
                            Err(e) if e.is_fatal() => {
                                debug!(session = %id, "Closing session: {}", e);
                                let pending = e.into_pending();
                                if !pending.is_empty() {
                                    send_events(&mut ws_sender, &pending).await;
                                }
                                let _ = ws_sender
                                    .send(Message::Close(Some(CloseFrame {
                                        code: close_code::NORMAL,
                                        reason: "no invitation".into(),
                                    })))
                                    .await;
                                break;
                            }
                            Err(e) => {
                                warn!(session = %id, "Frame failed: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Client is alive
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session = %id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(session = %id, "WebSocket error: {}", e);
                        break;
                    }
                    _ => {
                        // Binary frames are not part of the protocol
                    }
                }
            }
        }
    }

    ctx.registry.disconnect(id).await;
    debug!(session = %id, "WebSocket connection closed");
}
