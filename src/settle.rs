//! Settle strategies: how long to let the desktop stabilize after an action
//! before capturing the next observation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::sandbox::{Sandbox, SandboxResult};

#[async_trait]
pub trait SettleStrategy: Send + Sync {
    async fn settle(&self, sandbox: &mut dyn Sandbox) -> SandboxResult<()>;

    /// Longest time `settle` waits on its own, not counting sandbox calls.
    fn budget(&self) -> Duration;
}

/// Sleep for a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl SettleStrategy for FixedDelay {
    async fn settle(&self, _sandbox: &mut dyn Sandbox) -> SandboxResult<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }

    fn budget(&self) -> Duration {
        self.0
    }
}

/// Poll screenshots until two consecutive captures are identical, giving up
/// after `max_wait`.
#[derive(Debug, Clone, Copy)]
pub struct StableFrames {
    pub interval: Duration,
    pub max_wait: Duration,
}

#[async_trait]
impl SettleStrategy for StableFrames {
    async fn settle(&self, sandbox: &mut dyn Sandbox) -> SandboxResult<()> {
        let start = Instant::now();
        let mut previous = Sha256::digest(sandbox.capture_screenshot().await?);
        let mut polls = 1u32;

        loop {
            let remaining = self.max_wait.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                tracing::debug!(polls, "Screen did not stabilize within {:?}", self.max_wait);
                return Ok(());
            }
            tokio::time::sleep(self.interval.min(remaining)).await;

            let current = Sha256::digest(sandbox.capture_screenshot().await?);
            polls += 1;
            if current == previous {
                tracing::debug!(polls, elapsed = ?start.elapsed(), "Screen stable");
                return Ok(());
            }
            previous = current;
        }
    }

    fn budget(&self) -> Duration {
        self.max_wait
    }
}

/// Serializable choice of settle strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettleConfig {
    Fixed { delay_ms: u64 },
    StableFrames { interval_ms: u64, max_wait_ms: u64 },
}

impl Default for SettleConfig {
    fn default() -> Self {
        SettleConfig::Fixed { delay_ms: 1000 }
    }
}

impl SettleConfig {
    pub fn build(&self) -> Box<dyn SettleStrategy> {
        match *self {
            SettleConfig::Fixed { delay_ms } => {
                Box::new(FixedDelay(Duration::from_millis(delay_ms)))
            }
            SettleConfig::StableFrames {
                interval_ms,
                max_wait_ms,
            } => Box::new(StableFrames {
                interval: Duration::from_millis(interval_ms),
                max_wait: Duration::from_millis(max_wait_ms),
            }),
        }
    }
}
