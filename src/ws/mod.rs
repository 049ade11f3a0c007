//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams committed domain events to
//! clients subscribed by event id and answers read-only queries.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
