// Realtime analytics WebSocket. Token
// validation is external to this core; the handler only wires the socket
// into the realtime hub.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::app::AppState;
use crate::services::realtime_hub::{IDLE_TIMEOUT, PING_INTERVAL};

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub token: String,
    pub workspace_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    SubscribeLink { link_id: Uuid },
    UnsubscribeLink { link_id: Uuid },
}

pub async fn realtime_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn handle_socket(socket: WebSocket, state: AppState, query: RealtimeQuery) {
    // Token validation belongs to the surface that owns authentication;
    // this core trusts whatever gateway terminated the upgrade.
    let _ = &query.token;

    let connection_id = Uuid::new_v4();
    let mut rx = state
        .realtime_hub
        .register(connection_id, query.workspace_id, 256)
        .await;

    let (mut sender, mut receiver) = socket.split();
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    let mut last_pong = tokio::time::Instant::now();

    loop {
        tokio::select! {
            maybe_message = rx.recv() => {
                let Some(message) = maybe_message else { break };
                let Ok(payload) = serde_json::to_string(&message) else { continue };
                if sender.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(client_frame) = serde_json::from_str::<ClientFrame>(&text) {
                            match client_frame {
                                ClientFrame::SubscribeLink { link_id } => {
                                    state.realtime_hub.subscribe_link(connection_id, link_id).await;
                                }
                                ClientFrame::UnsubscribeLink { link_id } => {
                                    state.realtime_hub.unsubscribe_link(connection_id, link_id).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = tokio::time::Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("realtime socket {} error: {}", connection_id, e);
                        break;
                    }
                    _ => {}
                }
            }
            _ = ping_interval.tick() => {
                if last_pong.elapsed() > IDLE_TIMEOUT {
                    debug!("realtime socket {} missed heartbeat, closing", connection_id);
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.realtime_hub.unregister(connection_id).await;
}
