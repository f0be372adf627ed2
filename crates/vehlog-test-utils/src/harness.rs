// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` wires a temp SQLite database, a manual clock, the auth
//! validator, the ingestor, and the summarizer together, so tests can post
//! signed events and run summarization cycles deterministically.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use vehlog_config::model::{StorageConfig, VehlogConfig};
use vehlog_core::{Event, ManualClock, VehlogError};
use vehlog_ingest::{AuthValidator, EventIngestor};
use vehlog_storage::Database;
use vehlog_summarizer::{SummarizerSettings, TripReducer, TripSummarizer};

use crate::signed::{SignedEvent, TEST_TOKEN_NAME, TEST_TOKEN_SECRET};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    start: DateTime<Utc>,
    trail_len: usize,
    settings: SummarizerSettings,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut settings = SummarizerSettings::default();
        settings.pause = std::time::Duration::ZERO;
        Self {
            start: Utc
                .with_ymd_and_hms(2018, 3, 17, 5, 29, 31)
                .single()
                .unwrap_or_else(Utc::now),
            trail_len: 5,
            settings,
        }
    }

    /// Set the manual clock's starting instant.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Set the length of the recent-event trail.
    pub fn with_trail_len(mut self, trail_len: usize) -> Self {
        self.trail_len = trail_len;
        self
    }

    /// Override summarizer timing.
    pub fn with_settings(mut self, settings: SummarizerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, VehlogError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| VehlogError::Storage {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = VehlogConfig {
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().into_owned(),
                wal_mode: true,
            },
            ..VehlogConfig::default()
        };
        config
            .auth
            .keys
            .insert(TEST_TOKEN_NAME.to_string(), TEST_TOKEN_SECRET.to_string());
        config.summarizer.last_eventtypes_len = self.trail_len;

        let db = Database::from_config(&config.storage).await?;
        let clock = Arc::new(ManualClock::new(self.start));
        let validator = AuthValidator::from_config(&config.auth);
        let ingestor = EventIngestor::new(db.clone(), clock.clone());
        let reducer = TripReducer::new(db.clone(), self.trail_len);
        let summarizer =
            TripSummarizer::new(db.clone(), reducer.clone(), clock.clone(), self.settings);

        Ok(TestHarness {
            db,
            clock,
            validator,
            ingestor,
            reducer,
            summarizer,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment backed by a temp database.
pub struct TestHarness {
    /// Database handle (temp file, removed on drop).
    pub db: Database,
    /// Clock shared by the ingestor and summarizer.
    pub clock: Arc<ManualClock>,
    /// Validator that knows [`TEST_TOKEN_NAME`].
    pub validator: AuthValidator,
    pub ingestor: EventIngestor,
    pub reducer: TripReducer,
    pub summarizer: TripSummarizer,
    /// Configuration matching the wiring above.
    pub config: VehlogConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Authenticate and ingest one event, as the HTTP transport would.
    pub async fn submit(&self, event: &SignedEvent) -> Result<Event, VehlogError> {
        let body = event.body_bytes();
        let headers = event.headers();
        self.validator.validate_headers(&body, &headers)?;
        self.ingestor.ingest(&body, &headers).await
    }

    /// Advance the clock by `secs` seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }
}
