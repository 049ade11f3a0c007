//! Enrollment, check-in and daily leader handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CheckInRequest, EnrollRequest};
use crate::app_state::AppState;
use crate::domain::{Actor, CheckIn, Enrollment, EventId, ReadingSchedule, ScheduleId, UserId};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events/{id}/enrollments`: Enroll the caller.
///
/// # Errors
///
/// Returns [`GatewayError::StateConflict`] when the event is closed, full,
/// or the caller is already enrolled.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/enrollments",
    tag = "Enrollments",
    summary = "Enroll in an event",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 409, description = "Closed, full or duplicate", body = ErrorResponse),
    )
)]
pub async fn enroll(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
    Json(body): Json<EnrollRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let enrollment = state
        .engine
        .enrollments
        .enroll(EventId::from_uuid(id), actor.user_id, body.enrollment_type)
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// `GET /events/{id}/enrollments`: Enrollments in enrollment order.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] for an unknown event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/enrollments",
    tag = "Enrollments",
    summary = "List enrollments",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Enrollments", body = Vec<Enrollment>),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let enrollments = state.engine.enrollments.list(EventId::from_uuid(id)).await?;
    Ok(Json(enrollments))
}

/// `POST /events/{id}/enrollments/{user_id}/cancel`: Cancel an enrollment.
///
/// # Errors
///
/// Returns [`GatewayError::Authorization`] unless the caller is the user or
/// an admin.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/enrollments/{user_id}/cancel",
    tag = "Enrollments",
    summary = "Cancel an enrollment",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("user_id" = uuid::Uuid, Path, description = "Enrolled user UUID"),
    ),
    responses(
        (status = 200, description = "Cancelled enrollment", body = Enrollment),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 409, description = "Not cancellable", body = ErrorResponse),
    )
)]
pub async fn cancel_enrollment(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(uuid::Uuid, uuid::Uuid)>,
    actor: Actor,
) -> Result<impl IntoResponse, GatewayError> {
    let enrollment = state
        .engine
        .enrollments
        .cancel(EventId::from_uuid(id), UserId::from_uuid(user_id), &actor)
        .await?;
    Ok(Json(enrollment))
}

/// `POST /events/{id}/check-ins`: Record the caller's check-in.
///
/// # Errors
///
/// Returns [`GatewayError::StateConflict`] outside reading days or on a
/// second check-in for the same day.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/check-ins",
    tag = "Enrollments",
    summary = "Check in",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Check-in recorded", body = CheckIn),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 409, description = "Not a reading day or duplicate", body = ErrorResponse),
    )
)]
pub async fn check_in(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
    Json(body): Json<CheckInRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let date = body.date.unwrap_or_else(|| state.engine.ctx.clock.today());
    let check_in = state
        .engine
        .enrollments
        .check_in(EventId::from_uuid(id), actor.user_id, date, body.note)
        .await?;
    Ok((StatusCode::CREATED, Json(check_in)))
}

/// `POST /events/{id}/schedules/{schedule_id}/claim`: Claim a reading day.
///
/// # Errors
///
/// Returns [`GatewayError::StateConflict`] when the day is taken or the
/// claim limit is reached.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/schedules/{schedule_id}/claim",
    tag = "Leaders",
    summary = "Claim a reading day",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("schedule_id" = uuid::Uuid, Path, description = "Schedule UUID"),
    ),
    responses(
        (status = 200, description = "Claimed schedule", body = ReadingSchedule),
        (status = 409, description = "Taken or limit reached", body = ErrorResponse),
    )
)]
pub async fn claim_schedule(
    State(state): State<AppState>,
    Path((id, schedule_id)): Path<(uuid::Uuid, uuid::Uuid)>,
    actor: Actor,
) -> Result<impl IntoResponse, GatewayError> {
    let schedule = state
        .engine
        .leaders
        .claim(
            EventId::from_uuid(id),
            actor.user_id,
            ScheduleId::from_uuid(schedule_id),
        )
        .await?;
    Ok(Json(schedule))
}

/// `POST /events/{id}/leaders/auto-assign`: Deal reading days round-robin.
///
/// # Errors
///
/// Returns [`GatewayError::Authorization`] unless the caller leads the event
/// or is an admin.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/leaders/auto-assign",
    tag = "Leaders",
    summary = "Assign daily leaders",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Assigned schedules", body = Vec<ReadingSchedule>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 409, description = "Not a random-mode event", body = ErrorResponse),
    )
)]
pub async fn auto_assign(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from_uuid(id);
    let details = state.engine.lifecycle.get(event_id).await?;
    if details.event.leader_id != actor.user_id && !actor.is_admin() {
        return Err(GatewayError::Authorization(
            "only the event leader may assign daily leaders".to_string(),
        ));
    }
    let schedules = state.engine.leaders.auto_assign(event_id).await?;
    Ok(Json(schedules))
}

/// Enrollment, check-in and leader routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/events/{id}/enrollments",
            post(enroll).get(list_enrollments),
        )
        .route(
            "/events/{id}/enrollments/{user_id}/cancel",
            post(cancel_enrollment),
        )
        .route("/events/{id}/check-ins", post(check_in))
        .route(
            "/events/{id}/schedules/{schedule_id}/claim",
            post(claim_schedule),
        )
        .route("/events/{id}/leaders/auto-assign", post(auto_assign))
}
