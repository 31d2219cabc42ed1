mod routes;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use calmerge_core::{CalendarEngine, EngineConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let initial = rust_log.as_deref().unwrap_or("info");
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new(initial));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .init();

    let config = EngineConfig::load()?;

    // RUST_LOG wins over the configured level
    if rust_log.is_none() {
        match EnvFilter::try_new(&config.log_level) {
            Ok(filter) => {
                if let Err(e) = filter_handle.modify(|current| *current = filter) {
                    tracing::warn!(error = %e, "Failed to update log filter from config");
                }
            }
            Err(_) => {
                tracing::warn!(level = %config.log_level, "Invalid log level in config, keeping info")
            }
        }
    }

    let engine = CalendarEngine::from_config(&config)?;
    if engine.sources().is_empty() {
        tracing::warn!("No calendars configured; responses will be empty");
    }
    tracing::info!(
        calendars = ?engine.sources().names(),
        timezone = %engine.local_timezone(),
        cache_ttl = ?config.cache_ttl,
        "Calendar engine ready"
    );

    let app = app(AppState::new(Arc::new(engine)));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Could not bind {}", config.bind))?;
    tracing::info!("calmerge-server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::calendars::router())
        .merge(routes::health::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
