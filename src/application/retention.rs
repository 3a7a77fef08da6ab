//! Processed-event log retention.
//!
//! The audit log gains a row per provider event and only the recent window
//! is operationally useful. This background task deletes records older than
//! the retention period on a fixed interval.
//!
//! Sweeping does not weaken deduplication: the reconciliation handlers are
//! idempotent against the ledger itself, so a redelivery of a swept event
//! converges to a no-op instead of double-applying.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{info, warn};

use crate::domain::foundation::Timestamp;
use crate::ports::ProcessedEventLog;

/// Settings for the retention sweep.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// How many days of processed-event records to keep.
    pub retention_days: u32,

    /// How often the sweep runs.
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            sweep_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl RetentionConfig {
    /// Overrides the retention period.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Overrides the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Background task that prunes old processed-event records.
pub struct RetentionSweeper {
    event_log: Arc<dyn ProcessedEventLog>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    /// Creates a sweeper with default settings.
    pub fn new(event_log: Arc<dyn ProcessedEventLog>) -> Self {
        Self {
            event_log,
            config: RetentionConfig::default(),
        }
    }

    /// Creates a sweeper with custom settings.
    pub fn with_config(event_log: Arc<dyn ProcessedEventLog>, config: RetentionConfig) -> Self {
        Self { event_log, config }
    }

    /// Runs the sweep loop until the shutdown signal flips to `true`.
    ///
    /// The first sweep happens immediately, then once per interval. A failed
    /// sweep costs nothing but log growth until the next attempt, so errors
    /// never stop the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.sweep_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// Runs a single sweep, returning how many records were deleted.
    pub async fn sweep_once(&self) -> u64 {
        let cutoff = Timestamp::now().plus_days(-i64::from(self.config.retention_days));
        match self.event_log.delete_before(cutoff).await {
            Ok(deleted) => {
                if deleted > 0 {
                    info!(
                        deleted,
                        retention_days = self.config.retention_days,
                        "swept old processed-event records"
                    );
                }
                deleted
            }
            Err(error) => {
                warn!(error = %error, "retention sweep failed");
                0
            }
        }
    }
}
