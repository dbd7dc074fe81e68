//! Token holder leaderboard rebuilt from ERC-20 `Transfer` history.
//!
//! Balances are replayed from the chain's transfer logs over a trailing block
//! window, ranked, and served through a short-lived in-memory cache backed by
//! a persisted snapshot.

pub mod accumulator;
pub mod api;
pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod pacing;
pub mod service;
pub mod snapshot;
pub mod source;
pub mod types;

pub use accumulator::{accumulate, BalanceAccumulator, BalanceTable};
pub use builder::LeaderboardBuilder;
pub use cache::FreshnessCache;
pub use config::Config;
pub use error::{ConfigError, LeaderboardError};
pub use pacing::{FixedIntervalPacer, NoPacing, Pacer};
pub use service::LeaderboardService;
pub use snapshot::{FileSnapshotStore, RedisSnapshotStore, SnapshotStore};
pub use source::{ChainLogSource, LogProvider};
pub use types::{HolderEntry, HolderRecord, Leaderboard, TransferEvent, MINT_SENTINEL};
