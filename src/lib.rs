//! # readalong-gateway
//!
//! Engine and HTTP/WebSocket gateway for group reading events.
//!
//! A leader authors an event over a book and a date range; an admin reviews
//! it; participants enroll, check in on each reading day and reward each
//! other's check-ins out of a small daily allowance. Daily and final
//! leaderboards are built from those rewards, and the top readers receive
//! certificates when the event completes.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ReadingEngine (service/)
//!     │     approval · lifecycle · enrollment · leaders
//!     │     quota ledger · rewards · rankings · certificates
//!     │
//!     ├── EventRegistry + ActivityLog (domain/)
//!     ├── EventBus / Outbox (domain/)
//!     │
//!     └── PostgreSQL sink (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
