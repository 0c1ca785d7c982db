use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::AppState;

/// Side-channel events produced by ingestion, streamed to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RunAppended {
        suite: String,
        commit_id: String,
    },
    /// A known commit was resubmitted with a different payload and was
    /// reconciled in place.
    RunReconciled {
        suite: String,
        commit_id: String,
    },
    RegressionDetected {
        suite: String,
        commit_id: String,
        measurement: String,
        ratio: f64,
    },
    Connected {
        repo_id: String,
    },
}

/// Manages event subscriptions per tracked repository
pub struct EventManager {
    channels: RwLock<HashMap<String, broadcast::Sender<Event>>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to events for a repository
    pub async fn subscribe(&self, repo_id: &str) -> broadcast::Receiver<Event> {
        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(repo_id) {
            sender.subscribe()
        } else {
            let (tx, rx) = broadcast::channel(100);
            channels.insert(repo_id.to_string(), tx);
            rx
        }
    }

    /// Broadcast an event to all subscribers of a repository
    pub async fn broadcast(&self, repo_id: &str, event: Event) {
        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(repo_id) {
            let _ = sender.send(event);
        }
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket handler streaming a repository's ingestion events
pub async fn events_handler(
    ws: WebSocketUpgrade,
    Path(repo_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_events(socket, repo_id, state))
}

async fn handle_events(socket: WebSocket, repo_id: String, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_rx = state.events.subscribe(&repo_id).await;

    tracing::info!("client connected to events for repo {}", repo_id);

    let connected = Event::Connected {
        repo_id: repo_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&connected) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    loop {
        tokio::select! {
            // Forward events to client
            Ok(event) = event_rx.recv() => {
                if let Ok(json) = serde_json::to_string(&event) {
                    if let Err(e) = sender.send(Message::Text(json.into())).await {
                        tracing::error!("failed to send event: {}", e);
                        break;
                    }
                }
            }
            // Handle incoming messages (ping/pong, close)
            Some(msg) = receiver.next() => {
                match msg {
                    Ok(Message::Close(_)) => {
                        tracing::info!("client disconnected from repo {}", repo_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            tracing::error!("failed to send pong: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("websocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}
