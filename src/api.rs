use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::LeaderboardError;
use crate::service::LeaderboardService;
use crate::types::HolderRecord;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LeaderboardService>,
    pub config: Arc<Config>,
    pub start_time: u64,
}

impl AppState {
    pub fn new(service: Arc<LeaderboardService>, config: Arc<Config>) -> Self {
        Self {
            service,
            config,
            start_time: get_current_timestamp(),
        }
    }
}

fn get_current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// ============================================================================
// API HANDLERS
// ============================================================================

async fn root_handler() -> &'static str {
    "Welcome to the WIN Token Leaderboard API!"
}

async fn leaderboard_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<HolderRecord>>, LeaderboardError> {
    let leaderboard = state.service.get_leaderboard().await?;
    Ok(Json(leaderboard.records()))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;

    Json(serde_json::json!({
        "service": "token-leaderboard",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
        "token_address": config.token_address,
        "block_window": config.block_window,
        "chunk_size": config.chunk_size,
        "chunk_delay_ms": config.chunk_delay.as_millis() as u64,
        "cache_ttl_secs": config.cache_ttl.as_secs(),
        "snapshot_backend": if config.redis_url.is_some() { "redis" } else { "file" },
        "cached": !state.service.cache().is_empty(),
        "uptime": get_current_timestamp().saturating_sub(state.start_time)
    }))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new().route("/leaderboard", get(leaderboard_handler));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .merge(api.clone())
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
