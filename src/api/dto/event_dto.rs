//! Request and response bodies of the event endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::PaginationMeta;
use crate::domain::{EventStatus, EventSummary};

/// Query of `GET /events`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEventsQuery {
    /// Only events in this status.
    #[serde(default)]
    pub status: Option<EventStatus>,
}

/// Page of event summaries.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventListResponse {
    /// Events ordered by start date.
    pub data: Vec<EventSummary>,
    /// Page description.
    pub pagination: PaginationMeta,
}

/// Body of `POST /events/{id}/reject`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RejectRequest {
    /// Why the event was turned down.
    pub reason: String,
}

/// Result of `POST /events/{id}/start`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StartResponse {
    /// `false` when the start guard was not met; nothing changed then.
    pub started: bool,
}
