//! System endpoints: health check and engine rules.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    events: usize,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, engine clock time and the number of known events.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: state.engine.ctx.clock.now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            events: state.engine.ctx.registry.len().await,
        }),
    )
}

/// Business rules the engine runs with.
#[derive(Debug, Serialize, ToSchema)]
pub struct RulesResponse {
    daily_quota: u32,
    max_leader_claims: usize,
    auto_assign_threshold: usize,
    leader_window_days: u32,
    certificate_top_n: usize,
    auto_open_enrollment: bool,
}

/// `GET /config/rules`: Engine rules.
#[utoipa::path(
    get,
    path = "/config/rules",
    tag = "System",
    summary = "Engine rules",
    description = "Returns the quota, leadership and certificate rules in effect.",
    responses(
        (status = 200, description = "Rules in effect", body = RulesResponse),
    )
)]
pub async fn rules_handler(State(state): State<AppState>) -> impl IntoResponse {
    let settings = &state.engine.ctx.settings;
    Json(RulesResponse {
        daily_quota: settings.default_daily_quota,
        max_leader_claims: settings.max_leader_claims,
        auto_assign_threshold: settings.auto_assign_threshold,
        leader_window_days: settings.leader_window_days,
        certificate_top_n: settings.certificate_top_n,
        auto_open_enrollment: settings.auto_open_enrollment,
    })
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/rules", get(rules_handler))
}
