use crate::config::AppConfig;
use crate::error::MapError;
use crate::pipeline;
use crate::status::StatusSource;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::Html,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState<S> {
    pub config: AppConfig,
    pub source: S,
}

pub fn create_router<S: StatusSource>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/", get(index_handler::<S>))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server<S: StatusSource>(config: AppConfig, source: S) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let state = Arc::new(AppState { config, source });
    let app = create_router(state);

    info!(%addr, "starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

// Each request reloads both datasets.
async fn index_handler<S: StatusSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Html<String>, MapError> {
    let page = pipeline::build_page(&state.config, &state.source).await?;
    Ok(Html(page))
}

async fn health_handler() -> &'static str {
    "ok"
}
