// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vehlog serve` command implementation.
//!
//! Opens the database, wires the ingest path into the HTTP router, and
//! starts summarization on the configured trigger. SIGINT or SIGTERM stops
//! the listener, lets in-flight requests and the current cycle finish, then
//! closes the database.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vehlog_config::model::{SummarizeTrigger, VehlogConfig};
use vehlog_core::{Clock, SystemClock, VehlogError};
use vehlog_ingest::{AuthValidator, EventIngestor};
use vehlog_storage::Database;
use vehlog_summarizer::{CycleOutcome, SummarizerSettings, TripReducer, TripSummarizer};

use crate::server::{AppState, router};

/// Run the `vehlog serve` command.
pub async fn run_serve(config: VehlogConfig) -> Result<(), VehlogError> {
    info!("starting vehlog serve");

    let db = Database::from_config(&config.storage).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let validator = AuthValidator::from_config(&config.auth);
    if validator.is_empty() {
        warn!("no auth keys configured, every event will be rejected");
    }

    let reducer = TripReducer::new(db.clone(), config.summarizer.last_eventtypes_len);
    let settings = SummarizerSettings::from(&config.summarizer);
    let summarizer = Arc::new(TripSummarizer::new(
        db.clone(),
        reducer,
        clock.clone(),
        settings,
    ));
    info!(
        worker = summarizer.worker_id(),
        trigger = ?config.summarizer.trigger,
        "summarizer ready"
    );

    let cancel = install_signal_handler();

    let (after_ingest, timer) = match config.summarizer.trigger {
        SummarizeTrigger::Timer => (
            None,
            Some(spawn_timer(
                Arc::clone(&summarizer),
                settings,
                cancel.clone(),
            )),
        ),
        SummarizeTrigger::AfterIngest => (Some(Arc::clone(&summarizer)), None),
    };

    let state = AppState {
        validator: Arc::new(validator),
        ingestor: EventIngestor::new(db.clone(), clock),
        db: db.clone(),
        after_ingest,
    };
    let app = router(state, config.server.max_body_bytes);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VehlogError::Internal(format!("failed to bind {addr}: {e}")))?;
    info!(addr = %addr, "listening for events");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await
        .map_err(|e| VehlogError::Internal(format!("server error: {e}")));

    // The listener may also stop on its own error; make sure the timer follows.
    cancel.cancel();
    if let Some(timer) = timer
        && let Err(e) = timer.await
    {
        warn!(error = %e, "summarizer task ended abnormally");
    }

    db.close().await?;
    info!("vehlog stopped");
    served
}

/// Start the periodic summarization task.
///
/// The tick period equals the instance rate limit, so every tick normally
/// runs a cycle. Ticks missed during a long cycle are delayed, not bunched.
fn spawn_timer(
    summarizer: Arc<TripSummarizer>,
    settings: SummarizerSettings,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let period = settings
        .min_interval
        .to_std()
        .unwrap_or(Duration::from_secs(1))
        .max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match summarizer.run_cycle().await {
                Ok(CycleOutcome::Completed { summarized }) if summarized > 0 => {
                    info!(summarized, "summarization cycle completed");
                }
                Ok(outcome) => debug!(?outcome, "summarization cycle finished"),
                Err(e) => warn!(error = %e, "summarization cycle failed"),
            }
        }
        debug!("summarizer timer stopped");
    })
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, only Ctrl+C stops the server");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}
