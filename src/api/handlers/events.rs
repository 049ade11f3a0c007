//! Event handlers: authoring, review and the status state machine.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    EventListResponse, ListEventsQuery, PaginationParams, RejectRequest, StartResponse,
};
use crate::app_state::AppState;
use crate::domain::{Actor, EventDraft, EventId, EventPatch};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{CompletionReport, EventDetails, SubmissionReceipt};

/// `POST /events`: Create a draft event led by the caller.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] for malformed drafts.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Create a draft event",
    description = "Creates a Draft event led by the caller. One reading schedule is generated per activity day.",
    request_body = EventDraft,
    responses(
        (status = 201, description = "Event created", body = EventDetails),
        (status = 400, description = "Invalid draft", body = ErrorResponse),
        (status = 403, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    actor: Actor,
    Json(draft): Json<EventDraft>,
) -> Result<impl IntoResponse, GatewayError> {
    let details = state.engine.lifecycle.create_event(draft, &actor).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// `GET /events`: List events, optionally filtered by status.
///
/// # Errors
///
/// Returns [`GatewayError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "List events",
    description = "Returns a paginated list of event summaries ordered by start date.",
    params(PaginationParams, ListEventsQuery),
    responses(
        (status = 200, description = "Paginated event list", body = EventListResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(page): Query<PaginationParams>,
    Query(filter): Query<ListEventsQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let summaries = state.engine.lifecycle.list(filter.status).await;
    let (data, pagination) = page.paginate(summaries);
    Ok(Json(EventListResponse { data, pagination }))
}

/// `GET /events/{id}`: Event with its reading calendar.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] for an unknown event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get event details",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Event details", body = EventDetails),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let details = state.engine.lifecycle.get(EventId::from_uuid(id)).await?;
    Ok(Json(details))
}

/// `PATCH /events/{id}`: Edit a draft that is not under review.
///
/// # Errors
///
/// Returns [`GatewayError::Authorization`] for non-leaders and
/// [`GatewayError::StateConflict`] once the event is under review.
#[utoipa::path(
    patch,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Edit a draft event",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    request_body = EventPatch,
    responses(
        (status = 200, description = "Updated event", body = EventDetails),
        (status = 403, description = "Not the event leader", body = ErrorResponse),
        (status = 409, description = "Event not editable", body = ErrorResponse),
    )
)]
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
    Json(patch): Json<EventPatch>,
) -> Result<impl IntoResponse, GatewayError> {
    let details = state
        .engine
        .lifecycle
        .update_event(EventId::from_uuid(id), patch, &actor)
        .await?;
    Ok(Json(details))
}

/// `POST /events/{id}/submit`: Submit a draft for review.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] with every broken rule.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/submit",
    tag = "Review",
    summary = "Submit for approval",
    description = "Validates the draft and queues it for admin review. Nothing changes when validation fails.",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Queued for review", body = SubmissionReceipt),
        (status = 400, description = "Rule violations", body = ErrorResponse),
        (status = 409, description = "Already submitted", body = ErrorResponse),
    )
)]
pub async fn submit_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
) -> Result<impl IntoResponse, GatewayError> {
    let receipt = state
        .engine
        .approval
        .submit(EventId::from_uuid(id), &actor)
        .await?;
    Ok(Json(receipt))
}

/// `POST /events/{id}/approve`: Approve a submitted event (admin).
///
/// # Errors
///
/// Returns [`GatewayError::Authorization`] for non-admins.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/approve",
    tag = "Review",
    summary = "Approve an event",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Approved event", body = EventDetails),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 409, description = "Not awaiting review", body = ErrorResponse),
    )
)]
pub async fn approve_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from_uuid(id);
    state.engine.approval.approve(event_id, &actor).await?;
    Ok(Json(state.engine.lifecycle.get(event_id).await?))
}

/// `POST /events/{id}/reject`: Reject a submitted event (admin).
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] for a blank reason.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/reject",
    tag = "Review",
    summary = "Reject an event",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rejected event", body = EventDetails),
        (status = 400, description = "Reason missing", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    )
)]
pub async fn reject_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
    Json(body): Json<RejectRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from_uuid(id);
    state
        .engine
        .approval
        .reject(event_id, &actor, &body.reason)
        .await?;
    Ok(Json(state.engine.lifecycle.get(event_id).await?))
}

/// `POST /events/{id}/open`: Open enrollment on an approved draft (admin).
///
/// # Errors
///
/// Returns [`GatewayError::StateConflict`] unless the event is an approved draft.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/open",
    tag = "Lifecycle",
    summary = "Open enrollment",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Enrollment open", body = EventDetails),
        (status = 409, description = "Not an approved draft", body = ErrorResponse),
    )
)]
pub async fn open_enrollment(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from_uuid(id);
    state.engine.lifecycle.open_enrollment(event_id, &actor).await?;
    Ok(Json(state.engine.lifecycle.get(event_id).await?))
}

/// `POST /events/{id}/start`: Start the event if its guard holds.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] for an unknown event.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/start",
    tag = "Lifecycle",
    summary = "Start an event",
    description = "Moves an enrolling event to InProgress once approved, started and full enough. Reports `started: false` otherwise.",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Guard outcome", body = StartResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn start_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let started = state.engine.lifecycle.start(EventId::from_uuid(id)).await?;
    Ok(Json(StartResponse { started }))
}

/// `POST /events/{id}/complete`: Complete the event.
///
/// # Errors
///
/// Returns [`GatewayError::Authorization`] unless the caller is a current
/// leader or an admin after the end date.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/complete",
    tag = "Lifecycle",
    summary = "Complete an event",
    description = "Freezes rewards, recomputes completion rates, finalizes the ranking and issues certificates.",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Completion report", body = CompletionReport),
        (status = 403, description = "Not a current leader", body = ErrorResponse),
        (status = 409, description = "Not in progress", body = ErrorResponse),
    )
)]
pub async fn complete_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
) -> Result<impl IntoResponse, GatewayError> {
    let report = state
        .engine
        .lifecycle
        .complete(EventId::from_uuid(id), &actor)
        .await?;
    Ok(Json(report))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/{id}", get(get_event).patch(update_event))
        .route("/events/{id}/submit", post(submit_event))
        .route("/events/{id}/approve", post(approve_event))
        .route("/events/{id}/reject", post(reject_event))
        .route("/events/{id}/open", post(open_enrollment))
        .route("/events/{id}/start", post(start_event))
        .route("/events/{id}/complete", post(complete_event))
}
