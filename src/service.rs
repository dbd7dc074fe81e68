use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::accumulator::BalanceAccumulator;
use crate::builder::LeaderboardBuilder;
use crate::cache::FreshnessCache;
use crate::config::Config;
use crate::error::LeaderboardError;
use crate::pacing::{FixedIntervalPacer, Pacer};
use crate::snapshot::SnapshotStore;
use crate::source::{ChainLogSource, LogProvider};
use crate::types::Leaderboard;

/// The one key the freshness cache is ever asked about.
pub const LEADERBOARD_KEY: &str = "leaderboard";

pub struct LeaderboardService {
    source: ChainLogSource,
    builder: LeaderboardBuilder,
    snapshots: Arc<dyn SnapshotStore>,
    cache: Arc<FreshnessCache>,
    block_window: u64,
}

impl LeaderboardService {
    pub fn new(
        source: ChainLogSource,
        builder: LeaderboardBuilder,
        snapshots: Arc<dyn SnapshotStore>,
        cache: Arc<FreshnessCache>,
        block_window: u64,
    ) -> Self {
        Self {
            source,
            builder,
            snapshots,
            cache,
            block_window,
        }
    }

    /// Wires the production pacer and a fresh cache from configuration.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn LogProvider>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let pacer: Arc<dyn Pacer> = Arc::new(FixedIntervalPacer::new(config.chunk_delay));
        let source = ChainLogSource::new(provider, pacer, config.token_address, config.chunk_size);
        let builder = LeaderboardBuilder::new(config.reward_rate, config.token_decimals);
        let cache = Arc::new(FreshnessCache::new(config.cache_ttl));

        Self::new(source, builder, snapshots, cache, config.block_window)
    }

    pub fn cache(&self) -> &FreshnessCache {
        &self.cache
    }

    /// Current leaderboard: fresh cache, then snapshot, then a full replay of
    /// the trailing block window.
    ///
    /// A failed replay leaves both cache tiers untouched.
    pub async fn get_leaderboard(&self) -> Result<Arc<Leaderboard>, LeaderboardError> {
        if let Some(cached) = self.cache.get(LEADERBOARD_KEY) {
            return Ok(cached);
        }

        if let Some(snapshot) = self.snapshots.load().await {
            info!("[LEADERBOARD] Serving leaderboard from snapshot");
            let snapshot = Arc::new(snapshot);
            self.cache.put(LEADERBOARD_KEY, snapshot.clone());
            return Ok(snapshot);
        }

        let leaderboard = match self.compute().await {
            Ok(leaderboard) => Arc::new(leaderboard),
            Err(e) => {
                error!("[LEADERBOARD] Failed to compute leaderboard: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = self.snapshots.save(&leaderboard).await {
            warn!("[LEADERBOARD] Snapshot not persisted: {}", e);
        }
        self.cache.put(LEADERBOARD_KEY, leaderboard.clone());

        Ok(leaderboard)
    }

    async fn compute(&self) -> Result<Leaderboard, LeaderboardError> {
        let started = Instant::now();
        let head = self.source.head_block().await?;
        let from_block = head.saturating_sub(self.block_window);

        info!(
            "[LEADERBOARD] Fetching token holders over blocks {} to {}...",
            from_block, head
        );
        let events = self.source.fetch_transfers(from_block, head).await?;

        let mut accumulator = BalanceAccumulator::new();
        for event in &events {
            accumulator.apply(event)?;
        }
        let applied = accumulator.applied();
        let leaderboard = self.builder.build(accumulator.finish())?;

        info!(
            "[LEADERBOARD] Replayed {} transfers into {} holders in {:?}",
            applied,
            leaderboard.len(),
            started.elapsed()
        );
        Ok(leaderboard)
    }
}
