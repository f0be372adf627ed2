// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limited summarization cycles over the trip work queue.
//!
//! A cycle claims the oldest trip that has been quiet long enough, reduces
//! it, pauses, and repeats until nothing is eligible. Claims are leases, so
//! several summarizer processes can share one database without reducing the
//! same trip at once. The rate limit is per instance.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vehlog_config::model::SummarizerConfig;
use vehlog_core::{Clock, VehlogError};
use vehlog_storage::Database;
use vehlog_storage::queries::tripstodo;

use crate::reducer::TripReducer;

/// Timing knobs for [`TripSummarizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizerSettings {
    /// Minimum time between two cycles of one instance.
    pub min_interval: Duration,
    /// A trip must have been idle this long to be claimed.
    pub min_quiescence: Duration,
    /// Sleep between trips inside a cycle.
    pub pause: StdDuration,
    /// Length of a claim.
    pub lease: Duration,
}

/// Ceiling on configured intervals, keeping timestamp arithmetic in range.
const MAX_INTERVAL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

impl From<&SummarizerConfig> for SummarizerSettings {
    fn from(config: &SummarizerConfig) -> Self {
        let secs = |s: u64| {
            let s = i64::try_from(s).map_or(MAX_INTERVAL_SECS, |s| s.min(MAX_INTERVAL_SECS));
            Duration::seconds(s)
        };
        Self {
            min_interval: secs(config.run_every_secs),
            min_quiescence: secs(config.min_quiescence_secs),
            pause: StdDuration::from_millis(config.pause_ms),
            lease: secs(config.lease_secs),
        }
    }
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self::from(&SummarizerConfig::default())
    }
}

/// What a call to [`TripSummarizer::run_cycle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The previous cycle was too recent.
    Skipped,
    /// The queue was drained of eligible trips.
    Completed { summarized: usize },
}

/// Drives [`TripReducer`] over the work queue.
pub struct TripSummarizer {
    db: Database,
    reducer: TripReducer,
    clock: Arc<dyn Clock>,
    settings: SummarizerSettings,
    worker_id: String,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for TripSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripSummarizer")
            .field("worker_id", &self.worker_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TripSummarizer {
    pub fn new(
        db: Database,
        reducer: TripReducer,
        clock: Arc<dyn Clock>,
        settings: SummarizerSettings,
    ) -> Self {
        Self {
            db,
            reducer,
            clock,
            settings,
            worker_id: uuid::Uuid::new_v4().to_string(),
            last_run: Mutex::new(None),
        }
    }

    /// Replace the generated worker id recorded on claims.
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn settings(&self) -> &SummarizerSettings {
        &self.settings
    }

    /// Run one cycle unless this instance ran one within `min_interval`.
    ///
    /// A reduction failure ends the cycle and is returned. The failed trip
    /// keeps its claim until the lease lapses, after which a later cycle
    /// retries it.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, VehlogError> {
        let now = self.clock.now();
        {
            let mut last_run = self.last_run.lock().await;
            if let Some(prev) = *last_run
                && now - prev < self.settings.min_interval
            {
                debug!(worker = %self.worker_id, "summarization ran recently, skipping");
                return Ok(CycleOutcome::Skipped);
            }
            *last_run = Some(now);
        }

        let summarized = self.drain(self.settings.min_quiescence).await?;
        Ok(CycleOutcome::Completed { summarized })
    }

    /// Summarize every queued trip now, ignoring the rate limit and the
    /// quiescence threshold.
    pub async fn run_forced(&self) -> Result<usize, VehlogError> {
        *self.last_run.lock().await = Some(self.clock.now());
        self.drain(Duration::zero()).await
    }

    async fn drain(&self, quiescence: Duration) -> Result<usize, VehlogError> {
        let mut summarized = 0;
        loop {
            let now = self.clock.now();
            // With zero quiescence, a trip touched in this very millisecond
            // is still eligible.
            let stale_before = if quiescence.is_zero() {
                now + Duration::milliseconds(1)
            } else {
                now - quiescence
            };
            let Some(entry) = tripstodo::claim_oldest_stale(
                &self.db,
                &self.worker_id,
                stale_before,
                now,
                now + self.settings.lease,
            )
            .await?
            else {
                break;
            };

            debug!(tripid = %entry.tripid, last_touched = %entry.stamp, "claimed trip");
            if let Err(e) = self.reducer.reduce(&entry.tripid, now).await {
                warn!(tripid = %e.tripid(), error = %e, "trip summarization failed");
                return Err(e.into());
            }
            summarized += 1;

            if !self.settings.pause.is_zero() {
                tokio::time::sleep(self.settings.pause).await;
            }
        }

        if summarized > 0 {
            info!(summarized, "summarization cycle complete");
        }
        Ok(summarized)
    }
}
