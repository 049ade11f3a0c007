//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered domain events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::{SubscriptionManager, parse_event_ids};
use crate::domain::{DomainEvent, EventId};
use crate::error::GatewayError;
use crate::service::ReadingEngine;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<DomainEvent>,
    engine: Arc<ReadingEngine>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, &engine).await;
                        if let Some(json) = encode(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(domain_event) => {
                        if !subs.matches(domain_event.event_id()) {
                            continue;
                        }
                        let msg = WsMessage::server(
                            uuid::Uuid::new_v4().to_string(),
                            WsMessageType::Event,
                            serde_json::to_value(&domain_event).unwrap_or_default(),
                        );
                        if let Some(json) = encode(&msg)
                            && ws_tx.send(Message::text(json)).await.is_err() {
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

fn encode(msg: &WsMessage) -> Option<String> {
    serde_json::to_string(msg).ok()
}

/// Handles a text frame from the client and builds the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    engine: &ReadingEngine,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command message");
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe { event_ids } => {
            let (ids, wildcard, invalid) = parse_event_ids(&event_ids);
            subs.subscribe(&ids, wildcard);
            respond(
                msg.id,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "invalid": invalid,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { event_ids } => {
            let (ids, wildcard, invalid) = parse_event_ids(&event_ids);
            subs.unsubscribe(&ids, wildcard);
            respond(
                msg.id,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "invalid": invalid,
                    "remaining_count": subs.count(),
                }),
            )
        }
        WsCommand::GetEvent { event_id } => match parse_one(&event_id) {
            Ok(id) => reply(msg.id, engine.lifecycle.get(id).await),
            Err(e) => reply_error(msg.id, &e),
        },
        WsCommand::GetRanking { event_id, date } => match parse_one(&event_id) {
            Ok(id) => reply(msg.id, engine.rankings.snapshot(id, date).await),
            Err(e) => reply_error(msg.id, &e),
        },
    }
}

fn parse_one(raw: &str) -> Result<EventId, GatewayError> {
    raw.parse::<uuid::Uuid>()
        .map(EventId::from_uuid)
        .map_err(|_| GatewayError::invalid("event_id", "must be a UUID"))
}

fn respond(id: String, payload: serde_json::Value) -> WsMessage {
    WsMessage::server(id, WsMessageType::Response, payload)
}

fn reply<T: Serialize>(id: String, result: Result<T, GatewayError>) -> WsMessage {
    match result {
        Ok(value) => WsMessage::server(
            id,
            WsMessageType::Response,
            serde_json::to_value(&value).unwrap_or_default(),
        ),
        Err(e) => reply_error(id, &e),
    }
}

fn reply_error(id: String, error: &GatewayError) -> WsMessage {
    WsMessage::error(id, error.error_code(), error.to_string())
}
