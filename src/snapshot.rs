use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use rust_decimal::Decimal;
use ethers::types::Address;
use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::error::LeaderboardError;
use crate::types::{HolderRecord, Leaderboard};

/// Durable copy of the last computed leaderboard.
///
/// `load` never fails: a missing, unreadable or corrupt snapshot is reported
/// as `None` so the caller recomputes. `save` overwrites whatever was there.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Option<Leaderboard>;

    async fn save(&self, leaderboard: &Leaderboard) -> Result<(), LeaderboardError>;
}

fn encode(leaderboard: &Leaderboard) -> Result<Vec<u8>, LeaderboardError> {
    serde_json::to_vec_pretty(&leaderboard.records())
        .map_err(|e| LeaderboardError::Persistence(format!("Failed to serialize snapshot: {}", e)))
}

/// Parses persisted records and checks they still form a ranked leaderboard:
/// positive balances, non-increasing down the list, each address once.
fn decode(bytes: &[u8]) -> Result<Vec<HolderRecord>, LeaderboardError> {
    let records: Vec<HolderRecord> =
        serde_json::from_slice(bytes).map_err(|e| LeaderboardError::Decode(e.to_string()))?;

    let mut seen: HashSet<Address> = HashSet::with_capacity(records.len());
    for (rank, record) in records.iter().enumerate() {
        if record.balance <= Decimal::ZERO {
            return Err(LeaderboardError::Decode(format!(
                "entry {} ({:?}) has non-positive balance {}",
                rank, record.address, record.balance
            )));
        }
        if !seen.insert(record.address) {
            return Err(LeaderboardError::Decode(format!(
                "entry {} repeats address {:?}",
                rank, record.address
            )));
        }
    }

    if let Some(pair) = records.windows(2).find(|pair| pair[0].balance < pair[1].balance) {
        return Err(LeaderboardError::Decode(format!(
            "entries out of order: {} ranked above {}",
            pair[0].balance, pair[1].balance
        )));
    }

    Ok(records)
}

/// Shared load path for every backend: decode, validate, rebuild rewards.
/// Anything unusable is logged and reported as no snapshot.
fn restore(
    bytes: &[u8],
    origin: &str,
    reward_rate: Decimal,
    as_of: DateTime<Utc>,
) -> Option<Leaderboard> {
    match decode(bytes) {
        Ok(records) => {
            info!("[SNAPSHOT] Loaded {} holders from {}", records.len(), origin);
            Some(Leaderboard::from_records(records, reward_rate, as_of))
        }
        Err(e) => {
            warn!("[SNAPSHOT] Ignoring corrupt snapshot {}: {}", origin, e);
            None
        }
    }
}

// ============================================================================
// FILE BACKEND
// ============================================================================

pub struct FileSnapshotStore {
    path: PathBuf,
    reward_rate: Decimal,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>, reward_rate: Decimal) -> Self {
        Self {
            path: path.into(),
            reward_rate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn modified_at(&self) -> DateTime<Utc> {
        match tokio::fs::metadata(&self.path).await.and_then(|m| m.modified()) {
            Ok(time) => DateTime::<Utc>::from(time),
            Err(_) => Utc::now(),
        }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Option<Leaderboard> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("[SNAPSHOT] Cannot read {}: {}", self.path.display(), e);
                return None;
            }
        };

        let as_of = self.modified_at().await;
        restore(
            &bytes,
            &self.path.display().to_string(),
            self.reward_rate,
            as_of,
        )
    }

    async fn save(&self, leaderboard: &Leaderboard) -> Result<(), LeaderboardError> {
        let json = encode(leaderboard)?;
        let staging = self.staging_path();

        tokio::fs::write(&staging, json).await.map_err(|e| {
            LeaderboardError::Persistence(format!("Failed to write {}: {}", staging.display(), e))
        })?;
        tokio::fs::rename(&staging, &self.path).await.map_err(|e| {
            LeaderboardError::Persistence(format!(
                "Failed to move snapshot into {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!(
            "[SNAPSHOT] Saved {} holders to {}",
            leaderboard.len(),
            self.path.display()
        );
        Ok(())
    }
}

// ============================================================================
// REDIS BACKEND
// ============================================================================

pub struct RedisSnapshotStore {
    redis: ConnectionManager,
    key: String,
    reward_rate: Decimal,
}

impl RedisSnapshotStore {
    pub fn new(redis: ConnectionManager, key: impl Into<String>, reward_rate: Decimal) -> Self {
        Self {
            redis,
            key: key.into(),
            reward_rate,
        }
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn load(&self) -> Option<Leaderboard> {
        let mut redis_conn = self.redis.clone();
        let json = match redis_conn.get::<_, Option<Vec<u8>>>(&self.key).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!("[SNAPSHOT] Redis read of {} failed: {}", self.key, e);
                return None;
            }
        };

        restore(
            &json,
            &format!("redis:{}", self.key),
            self.reward_rate,
            Utc::now(),
        )
    }

    async fn save(&self, leaderboard: &Leaderboard) -> Result<(), LeaderboardError> {
        let json = encode(leaderboard)?;
        let mut redis_conn = self.redis.clone();

        redis_conn
            .set::<_, _, ()>(&self.key, json)
            .await
            .map_err(|e| LeaderboardError::Persistence(format!("Redis error: {}", e)))?;

        info!("[SNAPSHOT] Saved {} holders to redis:{}", leaderboard.len(), self.key);
        Ok(())
    }
}
