//! WebSocket session handling for the change feed

use crate::websocket::{ChangeEvent, ChangeHub};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Client-to-server control frame
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientCommand {
    /// Topic is `collection` or `collection:id`
    Subscribe { topic: String },
    Unsubscribe { topic: String },
}

/// Drive one client session until it disconnects.
///
/// The client starts with no subscriptions and only receives events for
/// topics it has subscribed to.
pub async fn serve_changes(socket: WebSocket, hub: Arc<ChangeHub>) {
    let (mut write, mut read) = socket.split();
    let mut events = hub.subscribe();
    let mut topics: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(ClientCommand::Subscribe { topic }) => {
                                tracing::debug!("Change feed subscribe: {}", topic);
                                topics.insert(topic);
                            }
                            Ok(ClientCommand::Unsubscribe { topic }) => {
                                topics.remove(&topic);
                            }
                            Err(e) => {
                                tracing::debug!("Ignoring malformed control frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if write.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("Change feed read error: {}", e);
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !subscribed(&topics, &event) {
                            continue;
                        }
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(_) => continue,
                        };
                        if write.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Change feed client lagged, skipped {} events", missed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

fn subscribed(topics: &HashSet<String>, event: &ChangeEvent) -> bool {
    topics.iter().any(|topic| event.matches(topic))
}
