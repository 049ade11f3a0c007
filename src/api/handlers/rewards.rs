//! Reward handlers: two-phase give and quota lookup.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{GiveRewardRequest, QuotaQuery};
use crate::app_state::AppState;
use crate::domain::{Actor, EventId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{GiveOutcome, QuotaReport};

/// `POST /events/{id}/rewards`: Preview or give a reward.
///
/// With `confirmed: false` nothing is spent and a preview is returned
/// (200). With `confirmed: true` the reward is committed (201).
///
/// # Errors
///
/// Returns [`GatewayError::InsufficientQuota`],
/// [`GatewayError::InvalidTarget`], [`GatewayError::SelfTargetNotAllowed`]
/// or [`GatewayError::EventNotActive`] when the give is refused.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/rewards",
    tag = "Rewards",
    summary = "Give a reward",
    description = "Spends tokens from the caller's daily quota on a recipient's check-in. Rewards are irrevocable.",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    request_body = GiveRewardRequest,
    responses(
        (status = 200, description = "Preview, nothing spent", body = GiveOutcome),
        (status = 201, description = "Reward given", body = GiveOutcome),
        (status = 400, description = "Invalid target or self reward", body = ErrorResponse),
        (status = 409, description = "Quota exhausted or event inactive", body = ErrorResponse),
        (status = 503, description = "Quota row busy, retry", body = ErrorResponse),
    )
)]
pub async fn give_reward(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
    Json(body): Json<GiveRewardRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let request = body.into_request(EventId::from_uuid(id), actor.user_id);
    let outcome = state.engine.rewards.give(request).await?;
    let status = match outcome {
        GiveOutcome::Preview(_) => StatusCode::OK,
        GiveOutcome::Given(_) => StatusCode::CREATED,
    };
    Ok((status, Json(outcome)))
}

/// `GET /events/{id}/quota`: The caller's quota for a day.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] for an unknown event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/quota",
    tag = "Rewards",
    summary = "Daily quota",
    params(("id" = uuid::Uuid, Path, description = "Event UUID"), QuotaQuery),
    responses(
        (status = 200, description = "Quota report", body = QuotaReport),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_quota(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
    Query(query): Query<QuotaQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let date = query.date.unwrap_or_else(|| state.engine.ctx.clock.today());
    let report = state
        .engine
        .rewards
        .quota_status(EventId::from_uuid(id), actor.user_id, date)
        .await?;
    Ok(Json(report))
}

/// Reward routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/rewards", post(give_reward))
        .route("/events/{id}/quota", get(get_quota))
}
