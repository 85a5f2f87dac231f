use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time::interval;

use events::EventBus;

use crate::messages::{ClientMessage, ServerMessage, SubscriptionFilter};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct WsState {
    pub event_bus: EventBus,
}

impl WsState {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serializes and sends one message. `false` once the peer is gone.
async fn send(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize WebSocket message");
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

/// What a connection does with a client frame.
#[derive(Debug)]
enum Reply {
    Send(ServerMessage),
    Close,
    Ignore,
}

/// Applies a client text frame to the connection's subscription.
fn handle_client_text(text: &str, filter: &mut Option<SubscriptionFilter>, subscribed: &mut bool) -> Reply {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { filter: new_filter }) => {
            *filter = new_filter.clone();
            *subscribed = true;
            tracing::debug!(rooms = ?new_filter.as_ref().and_then(|f| f.session_ids.as_ref()), "WebSocket subscribed");
            Reply::Send(ServerMessage::Subscribed { filter: new_filter })
        }
        Ok(ClientMessage::Unsubscribe) => {
            *subscribed = false;
            *filter = None;
            Reply::Send(ServerMessage::Unsubscribed)
        }
        Ok(ClientMessage::Ping) => Reply::Send(ServerMessage::Pong),
        Err(e) => Reply::Send(ServerMessage::Error {
            message: format!("Invalid message: {}", e),
        }),
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_rx = state.event_bus.subscribe();
    let mut filter: Option<SubscriptionFilter> = None;
    let mut subscribed = false;

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    heartbeat.reset();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !send(&mut sender, &ServerMessage::Pong).await {
                    break;
                }
            }

            event_result = event_rx.recv() => {
                match event_result {
                    Ok(envelope) => {
                        let wanted = subscribed
                            && filter.as_ref().map(|f| f.matches(&envelope)).unwrap_or(true);
                        if wanted && !send(&mut sender, &ServerMessage::Event { envelope }).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(missed = n, "WebSocket client lagged");
                        if subscribed && !send(&mut sender, &ServerMessage::Lagged { missed: n }).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            msg = tokio::time::timeout(CLIENT_TIMEOUT + HEARTBEAT_INTERVAL, receiver.next()) => {
                let reply = match msg {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        handle_client_text(text.as_str(), &mut filter, &mut subscribed)
                    }
                    Ok(Some(Ok(Message::Ping(data)))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        Reply::Ignore
                    }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) => Reply::Close,
                    Ok(Some(Ok(_))) => Reply::Ignore,
                    Err(_) => {
                        tracing::debug!("WebSocket client idle");
                        Reply::Ignore
                    }
                };

                match reply {
                    Reply::Send(message) => {
                        if !send(&mut sender, &message).await {
                            break;
                        }
                    }
                    Reply::Close => break,
                    Reply::Ignore => {}
                }
            }
        }
    }

    tracing::debug!("WebSocket connection closed");
}
