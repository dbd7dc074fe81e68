use ethers::providers::{Http, Provider};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use token_leaderboard::{
    api::{self, AppState},
    Config, FileSnapshotStore, LeaderboardService, RedisSnapshotStore, SnapshotStore,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    info!("Starting Token Leaderboard Service v{}", env!("CARGO_PKG_VERSION"));

    let provider = Provider::<Http>::try_from(config.rpc_url.as_str())?;

    let snapshots: Arc<dyn SnapshotStore> = match &config.redis_url {
        Some(redis_url) => {
            let redis_client = redis::Client::open(redis_url.as_str())?;
            let redis_conn = ConnectionManager::new(redis_client).await?;
            info!("Connected to Redis");
            Arc::new(RedisSnapshotStore::new(
                redis_conn,
                config.snapshot_key.clone(),
                config.reward_rate,
            ))
        }
        None => Arc::new(FileSnapshotStore::new(
            config.snapshot_path.clone(),
            config.reward_rate,
        )),
    };

    let service = Arc::new(LeaderboardService::from_config(
        &config,
        Arc::new(provider),
        snapshots,
    ));
    let state = AppState::new(service, Arc::new(config.clone()));
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Token Leaderboard Service running on {}", addr);
    info!("Token: {:?}", config.token_address);
    info!(
        "Window: {} blocks, chunk size {}, chunk delay {:?}",
        config.block_window, config.chunk_size, config.chunk_delay
    );
    info!("Cache TTL: {:?}", config.cache_ttl);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
