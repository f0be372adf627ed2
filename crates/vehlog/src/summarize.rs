// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vehlog summarize` command implementation.

use std::sync::Arc;

use tracing::info;
use vehlog_config::model::VehlogConfig;
use vehlog_core::{SystemClock, VehlogError};
use vehlog_storage::Database;
use vehlog_summarizer::{CycleOutcome, SummarizerSettings, TripReducer, TripSummarizer};

/// Run one summarization pass against the configured database.
///
/// With `force`, every queued trip is summarized regardless of how recently
/// it received events.
pub async fn run_summarize(config: &VehlogConfig, force: bool) -> Result<(), VehlogError> {
    let db = Database::from_config(&config.storage).await?;
    let summarized = summarize_once(&db, config, force).await;
    db.close().await?;

    let summarized = summarized?;
    let trip_word = if summarized == 1 { "trip" } else { "trips" };
    println!("summarized {summarized} {trip_word}");
    Ok(())
}

async fn summarize_once(
    db: &Database,
    config: &VehlogConfig,
    force: bool,
) -> Result<usize, VehlogError> {
    let reducer = TripReducer::new(db.clone(), config.summarizer.last_eventtypes_len);
    let summarizer = TripSummarizer::new(
        db.clone(),
        reducer,
        Arc::new(SystemClock),
        SummarizerSettings::from(&config.summarizer),
    );
    info!(worker = summarizer.worker_id(), force, "running summarization");

    if force {
        return summarizer.run_forced().await;
    }
    // A fresh instance has no previous cycle, so the rate limit cannot skip.
    match summarizer.run_cycle().await? {
        CycleOutcome::Completed { summarized } => Ok(summarized),
        CycleOutcome::Skipped => Ok(0),
    }
}
