//! REST API layer: route handlers, DTOs, extractors and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`; `/health`,
//! `/config/rules` and the `/ws` stream sit at the root.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod openapi;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the serving application: REST routes, the WebSocket endpoint,
/// request tracing, permissive CORS and, with the `swagger-ui` feature,
/// the interactive docs at `/swagger-ui`.
pub fn build_app(state: AppState) -> Router {
    let router = build_router().route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::service::fixtures::harness;

    fn app() -> Router {
        build_app(AppState::new(harness().engine))
    }

    #[tokio::test]
    async fn health_is_served_at_the_root() {
        let Ok(request) = Request::builder().uri("/health").body(Body::empty()) else {
            panic!("request should build");
        };
        // The router's error type is Infallible.
        let Ok(response) = app().oneshot(request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_event_maps_to_not_found_body() {
        let uri = format!("/api/v1/events/{}", uuid::Uuid::new_v4());
        let Ok(request) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(response) = app().oneshot(request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("body should be JSON");
        };
        assert_eq!(body.pointer("/error/code"), Some(&serde_json::json!(2001)));
    }

    #[tokio::test]
    async fn mutations_require_identity_headers() {
        let Ok(request) = Request::builder()
            .method("POST")
            .uri("/api/v1/events")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
        else {
            panic!("request should build");
        };
        let Ok(response) = app().oneshot(request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
