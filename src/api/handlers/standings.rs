//! Ranking and certificate handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;

use crate::api::dto::{GenerateRankingQuery, IssueCertificatesRequest};
use crate::app_state::AppState;
use crate::domain::{Actor, Certificate, DailyRankingSnapshot, EventId, FinalRanking, UserId};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events/{id}/rankings/{date}`: Generate the daily ranking.
///
/// # Errors
///
/// Returns [`GatewayError::Authorization`] when a non-admin forces a
/// rebuild.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/rankings/{date}",
    tag = "Rankings",
    summary = "Generate a daily ranking",
    description = "Aggregates the rewards committed on `date`. An existing snapshot is returned unchanged unless `force=true`.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("date" = String, Path, description = "Day to rank (YYYY-MM-DD)"),
        GenerateRankingQuery,
    ),
    responses(
        (status = 200, description = "Snapshot", body = DailyRankingSnapshot),
        (status = 400, description = "Date outside the event", body = ErrorResponse),
        (status = 403, description = "Admin role required to force", body = ErrorResponse),
    )
)]
pub async fn generate_daily_ranking(
    State(state): State<AppState>,
    Path((id, date)): Path<(uuid::Uuid, NaiveDate)>,
    actor: Actor,
    Query(query): Query<GenerateRankingQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    if query.force && !actor.is_admin() {
        return Err(GatewayError::Authorization(
            "only admins may regenerate a ranking".to_string(),
        ));
    }
    let snapshot = state
        .engine
        .rankings
        .daily_ranking(EventId::from_uuid(id), date, query.force)
        .await?;
    Ok(Json(snapshot))
}

/// `GET /events/{id}/rankings/{date}`: Stored daily ranking.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the day was never ranked.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/rankings/{date}",
    tag = "Rankings",
    summary = "Get a daily ranking",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("date" = String, Path, description = "Ranked day (YYYY-MM-DD)"),
    ),
    responses(
        (status = 200, description = "Snapshot", body = DailyRankingSnapshot),
        (status = 404, description = "Not generated", body = ErrorResponse),
    )
)]
pub async fn get_daily_ranking(
    State(state): State<AppState>,
    Path((id, date)): Path<(uuid::Uuid, NaiveDate)>,
) -> Result<impl IntoResponse, GatewayError> {
    let snapshot = state
        .engine
        .rankings
        .snapshot(EventId::from_uuid(id), date)
        .await?;
    Ok(Json(snapshot))
}

/// `GET /events/{id}/rankings/final`: Final leaderboard.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] before the event completes.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/rankings/final",
    tag = "Rankings",
    summary = "Get the final ranking",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Final ranking", body = FinalRanking),
        (status = 404, description = "Not finalized", body = ErrorResponse),
    )
)]
pub async fn get_final_ranking(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let ranking = state
        .engine
        .rankings
        .final_ranking(EventId::from_uuid(id))
        .await?;
    Ok(Json(ranking))
}

/// `POST /events/{id}/certificates`: Issue top-N certificates.
///
/// # Errors
///
/// Returns [`GatewayError::Authorization`] unless the caller leads the event
/// or is an admin, and [`GatewayError::StateConflict`] before completion.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/certificates",
    tag = "Certificates",
    summary = "Issue certificates",
    description = "Idempotent: ranks that already hold a certificate are skipped. Returns only the certificates created by this call.",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    request_body = IssueCertificatesRequest,
    responses(
        (status = 201, description = "Newly issued certificates", body = Vec<Certificate>),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 409, description = "Event not completed", body = ErrorResponse),
    )
)]
pub async fn issue_certificates(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    actor: Actor,
    Json(body): Json<IssueCertificatesRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from_uuid(id);
    let details = state.engine.lifecycle.get(event_id).await?;
    if details.event.leader_id != actor.user_id && !actor.is_admin() {
        return Err(GatewayError::Authorization(
            "only the event leader may issue certificates".to_string(),
        ));
    }
    let n = body
        .n
        .unwrap_or(state.engine.ctx.settings.certificate_top_n);
    let issued = state.engine.certificates.issue_top_n(event_id, n).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// `GET /events/{id}/certificates`: Certificates of an event.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] for an unknown event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/certificates",
    tag = "Certificates",
    summary = "List event certificates",
    params(("id" = uuid::Uuid, Path, description = "Event UUID")),
    responses(
        (status = 200, description = "Certificates by rank", body = Vec<Certificate>),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_event_certificates(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::from_uuid(id);
    state.engine.ctx.registry.get(event_id).await?;
    Ok(Json(
        state.engine.certificates.certificates_for_event(event_id).await,
    ))
}

/// `GET /users/{user_id}/certificates`: Certificates held by a user.
///
/// # Errors
///
/// Returns [`GatewayError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/certificates",
    tag = "Certificates",
    summary = "List a user's certificates",
    params(("user_id" = uuid::Uuid, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Certificates, newest first", body = Vec<Certificate>),
    )
)]
pub async fn list_user_certificates(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(
        state
            .engine
            .certificates
            .certificates_for_user(UserId::from_uuid(user_id))
            .await,
    ))
}

/// Ranking and certificate routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/rankings/final", get(get_final_ranking))
        .route(
            "/events/{id}/rankings/{date}",
            post(generate_daily_ranking).get(get_daily_ranking),
        )
        .route(
            "/events/{id}/certificates",
            post(issue_certificates).get(list_event_certificates),
        )
        .route("/users/{user_id}/certificates", get(list_user_certificates))
}
