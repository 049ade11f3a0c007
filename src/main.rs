//! readalong-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use readalong_gateway::api;
use readalong_gateway::app_state::AppState;
use readalong_gateway::config::{GatewayConfig, LogFormat};
use readalong_gateway::domain::{EventBus, SystemClock};
use readalong_gateway::persistence::{PostgresPersistence, spawn_dispatcher};
use readalong_gateway::service::ReadingEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting readalong-gateway");

    if !config.persistence_enabled {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let engine = ReadingEngine::new(config.engine.clone(), Arc::new(SystemClock), event_bus);
        return serve(&config, engine).await;
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;
    let store = PostgresPersistence::new(pool);

    let (event_bus, journal) = EventBus::with_journal(config.event_bus_capacity);
    let engine = ReadingEngine::new(config.engine.clone(), Arc::new(SystemClock), event_bus);
    let state = store.load_state().await?;
    if !state.is_empty() {
        engine.restore(state).await?;
    }
    spawn_dispatcher(engine.clone(), Arc::new(store), journal);
    tracing::info!(journaled = engine.event_bus().is_journaled(), "persistence dispatcher running");

    serve(&config, engine).await
}

async fn serve(config: &GatewayConfig, engine: ReadingEngine) -> anyhow::Result<()> {
    let app = api::build_app(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
