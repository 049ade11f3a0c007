//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain records are serialized as they are; these types cover request
//! bodies, query strings and list envelopes.

pub mod activity_dto;
pub mod common_dto;
pub mod event_dto;
pub mod ranking_dto;

pub use activity_dto::*;
pub use common_dto::*;
pub use event_dto::*;
pub use ranking_dto::*;
