//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single observer connection: applies
//! subscription commands and forwards matching channel events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsRequest};
use super::subscription::SubscriptionManager;
use crate::domain::ChannelEvent;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads subscription commands from the client and acknowledges them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(socket: WebSocket, mut event_rx: broadcast::Receiver<ChannelEvent>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs);
                        if let Some(json) = encode(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if !subs.matches(event.channel()) {
                            continue;
                        }
                        let Ok(payload) = serde_json::to_value(&event) else {
                            continue;
                        };
                        if let Some(json) = encode(&WsMessage::event(payload))
                            && ws_tx.send(Message::text(json)).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Applies one client message and returns the reply envelope.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> WsMessage {
    let request = match serde_json::from_str::<WsRequest>(text) {
        Ok(request) => request,
        Err(e) if e.is_data() => return WsMessage::error("", 404, "unknown command"),
        Err(_) => return WsMessage::error("", 400, "malformed JSON"),
    };

    match request.command {
        WsCommand::Subscribe { channels } => {
            subs.subscribe(&channels);
            WsMessage::response(
                request.id,
                json!({
                    "subscribed": channels,
                    "channels": subs.channels(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { channels } => {
            subs.unsubscribe(&channels);
            WsMessage::response(
                request.id,
                json!({
                    "unsubscribed": channels,
                    "channels": subs.channels(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
    }
}

fn encode(message: &WsMessage) -> Option<String> {
    serde_json::to_string(message).ok()
}
