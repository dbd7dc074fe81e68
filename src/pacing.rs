use async_trait::async_trait;
use std::time::Duration;
use tokio::time;

/// Gate between consecutive upstream log queries.
///
/// Pacing is a rate-limit courtesy towards the RPC endpoint; nothing in the
/// accounting depends on it.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Sleeps a fixed interval on every call.
#[derive(Debug, Clone, Copy)]
pub struct FixedIntervalPacer {
    interval: Duration,
}

impl FixedIntervalPacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Pacer for FixedIntervalPacer {
    async fn pause(&self) {
        if !self.interval.is_zero() {
            time::sleep(self.interval).await;
        }
    }
}

/// Never waits. Used by tests and by deployments with a private RPC node.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn pause(&self) {}
}
