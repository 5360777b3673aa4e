// Realtime hub: workspace/link subscriber indexes, serialized
// through a single control loop; broadcast is lossy per-subscriber.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::click_event::ClickEvent;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeMessage {
    Click { data: ClickEventPayload },
}

#[derive(Debug, Clone, Serialize)]
pub struct ClickEventPayload {
    pub link_id: Uuid,
    pub short_code: String,
    pub country: String,
    pub device_type: String,
    pub is_bot: bool,
}

impl From<&ClickEvent> for ClickEventPayload {
    fn from(event: &ClickEvent) -> Self {
        Self {
            link_id: event.link_id,
            short_code: event.short_code.clone(),
            country: event.country.clone(),
            device_type: event.device_type.as_str().to_string(),
            is_bot: event.is_bot,
        }
    }
}

struct Subscriber {
    connection_id: Uuid,
    tx: mpsc::Sender<RealtimeMessage>,
}

enum ControlMessage {
    Register {
        connection_id: Uuid,
        workspace_id: Uuid,
        tx: mpsc::Sender<RealtimeMessage>,
    },
    Unregister {
        connection_id: Uuid,
    },
    SubscribeLink {
        connection_id: Uuid,
        link_id: Uuid,
    },
    UnsubscribeLink {
        connection_id: Uuid,
        link_id: Uuid,
    },
    BroadcastWorkspace {
        workspace_id: Uuid,
        message: RealtimeMessage,
    },
    BroadcastLink {
        link_id: Uuid,
        message: RealtimeMessage,
    },
}

#[derive(Default)]
struct Indexes {
    by_workspace: HashMap<Uuid, Vec<Subscriber>>,
    by_link: HashMap<Uuid, HashSet<Uuid>>,
    connection_workspace: HashMap<Uuid, Uuid>,
}

pub struct RealtimeHub {
    control: mpsc::Sender<ControlMessage>,
    drops: Arc<std::sync::atomic::AtomicU64>,
}

impl RealtimeHub {
    pub fn spawn(subscriber_buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(1024);
        let drops = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let drops_for_loop = drops.clone();

        tokio::spawn(async move {
            run_control_loop(rx, subscriber_buffer, drops_for_loop).await;
        });

        Self { control: tx, drops }
    }

    pub fn dropped_count(&self) -> u64 {
        self.drops.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub async fn register(
        &self,
        connection_id: Uuid,
        workspace_id: Uuid,
        buffer: usize,
    ) -> mpsc::Receiver<RealtimeMessage> {
        let (tx, rx) = mpsc::channel(buffer);
        let _ = self
            .control
            .send(ControlMessage::Register {
                connection_id,
                workspace_id,
                tx,
            })
            .await;
        rx
    }

    pub async fn unregister(&self, connection_id: Uuid) {
        let _ = self.control.send(ControlMessage::Unregister { connection_id }).await;
    }

    pub async fn subscribe_link(&self, connection_id: Uuid, link_id: Uuid) {
        let _ = self
            .control
            .send(ControlMessage::SubscribeLink { connection_id, link_id })
            .await;
    }

    pub async fn unsubscribe_link(&self, connection_id: Uuid, link_id: Uuid) {
        let _ = self
            .control
            .send(ControlMessage::UnsubscribeLink { connection_id, link_id })
            .await;
    }

    pub async fn broadcast_workspace(&self, workspace_id: Uuid, event: &ClickEvent) {
        let message = RealtimeMessage::Click {
            data: ClickEventPayload::from(event),
        };
        let _ = self
            .control
            .send(ControlMessage::BroadcastWorkspace { workspace_id, message })
            .await;
    }

    pub async fn broadcast_link(&self, link_id: Uuid, event: &ClickEvent) {
        let message = RealtimeMessage::Click {
            data: ClickEventPayload::from(event),
        };
        let _ = self
            .control
            .send(ControlMessage::BroadcastLink { link_id, message })
            .await;
    }
}

async fn run_control_loop(
    mut rx: mpsc::Receiver<ControlMessage>,
    _subscriber_buffer: usize,
    drops: Arc<std::sync::atomic::AtomicU64>,
) {
    let indexes = RwLock::new(Indexes::default());

    while let Some(msg) = rx.recv().await {
        match msg {
            ControlMessage::Register {
                connection_id,
                workspace_id,
                tx,
            } => {
                let mut idx = indexes.write().await;
                idx.by_workspace
                    .entry(workspace_id)
                    .or_default()
                    .push(Subscriber { connection_id, tx });
                idx.connection_workspace.insert(connection_id, workspace_id);
            }
            ControlMessage::Unregister { connection_id } => {
                let mut idx = indexes.write().await;
                if let Some(workspace_id) = idx.connection_workspace.remove(&connection_id) {
                    if let Some(subs) = idx.by_workspace.get_mut(&workspace_id) {
                        subs.retain(|s| s.connection_id != connection_id);
                    }
                }
                for subs in idx.by_link.values_mut() {
                    subs.remove(&connection_id);
                }
            }
            ControlMessage::SubscribeLink { connection_id, link_id } => {
                let mut idx = indexes.write().await;
                idx.by_link.entry(link_id).or_default().insert(connection_id);
            }
            ControlMessage::UnsubscribeLink { connection_id, link_id } => {
                let mut idx = indexes.write().await;
                if let Some(subs) = idx.by_link.get_mut(&link_id) {
                    subs.remove(&connection_id);
                }
            }
            ControlMessage::BroadcastWorkspace { workspace_id, message } => {
                let idx = indexes.read().await;
                if let Some(subs) = idx.by_workspace.get(&workspace_id) {
                    for sub in subs {
                        if sub.tx.try_send(message.clone()).is_err() {
                            drops.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            debug!("dropped realtime message for subscriber {}", sub.connection_id);
                        }
                    }
                }
            }
            ControlMessage::BroadcastLink { link_id, message } => {
                let idx = indexes.read().await;
                let Some(connection_ids) = idx.by_link.get(&link_id) else {
                    continue;
                };
                for subs in idx.by_workspace.values() {
                    for sub in subs {
                        if connection_ids.contains(&sub.connection_id)
                            && sub.tx.try_send(message.clone()).is_err()
                        {
                            drops.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            warn!("dropped link-scoped realtime message for {}", sub.connection_id);
                        }
                    }
                }
            }
        }
    }
}

/// Heartbeat window: missing pongs within this duration cause the hub to
/// close and unregister a subscriber. Enforced by the WebSocket handler.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(90);
pub const PING_INTERVAL: Duration = Duration::from_secs(30);
