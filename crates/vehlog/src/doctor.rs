// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vehlog doctor` command implementation.
//!
//! Runs diagnostic checks against the configuration and the event database
//! to spot missing secrets, a stuck work queue, and storage problems.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use chrono::Utc;
use vehlog_config::model::{StorageConfig, VehlogConfig};
use vehlog_core::{VehlogError, parse_stamp};
use vehlog_storage::Database;
use vehlog_storage::queries::{events, trips, tripstodo};

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed successfully.
    Pass,
    /// Check passed with a warning.
    Warn,
    /// Check failed.
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Check status.
    pub status: CheckStatus,
    /// Human-readable message.
    pub message: String,
    /// Duration the check took.
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `vehlog doctor` command.
///
/// With `plain`, disables colored output. Returns an error when any check fails.
pub async fn run_doctor(config: &VehlogConfig, plain: bool) -> Result<(), VehlogError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let results = run_checks(config).await;

    println!();
    println!("  vehlog doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;
    for result in &results {
        match result.status {
            CheckStatus::Fail => fail_count += 1,
            CheckStatus::Warn => warn_count += 1,
            CheckStatus::Pass => {}
        }
        println!("{}", render_line(result, use_color));
    }

    println!();
    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    if fail_count > 0 {
        return Err(VehlogError::Internal(format!(
            "{fail_count} doctor check(s) failed"
        )));
    }
    Ok(())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!(
            "    {symbol} {:<20} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

async fn run_checks(config: &VehlogConfig) -> Vec<CheckResult> {
    let mut results = vec![check_config(config), check_auth_keys(config)];

    let (db_result, db) = check_database(&config.storage).await;
    results.push(db_result);
    if let Some(db) = db {
        results.push(check_backlog(&db).await);
        results.push(check_stored(&db).await);
        if let Err(e) = db.close().await {
            tracing::warn!(error = %e, "failed to checkpoint database after doctor checks");
        }
    }
    results
}

/// Re-run validation on the loaded configuration.
fn check_config(config: &VehlogConfig) -> CheckResult {
    let start = Instant::now();
    match vehlog_config::validation::validate_config(config) {
        Ok(()) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Without any shared secret every event is rejected.
fn check_auth_keys(config: &VehlogConfig) -> CheckResult {
    let start = Instant::now();
    let count = config.auth.keys.len();
    if count == 0 {
        CheckResult::new(
            "Auth keys",
            CheckStatus::Warn,
            "none configured, all events will be rejected",
            start,
        )
    } else {
        let names: Vec<&str> = config.auth.keys.keys().map(String::as_str).collect();
        CheckResult::new(
            "Auth keys",
            CheckStatus::Pass,
            format!("{count} configured ({})", names.join(", ")),
            start,
        )
    }
}

/// Open the database (applying migrations) and run a trivial query.
///
/// A missing file is only a warning; it is created on first run.
async fn check_database(storage: &StorageConfig) -> (CheckResult, Option<Database>) {
    let start = Instant::now();
    let db_path = &storage.database_path;

    if !std::path::Path::new(db_path).exists() {
        return (
            CheckResult::new(
                "Database",
                CheckStatus::Warn,
                format!("not found: {db_path} (will be created on first run)"),
                start,
            ),
            None,
        );
    }

    let db = match Database::from_config(storage).await {
        Ok(db) => db,
        Err(e) => {
            return (
                CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start),
                None,
            );
        }
    };

    match db.health_check().await {
        Ok(()) => (
            CheckResult::new("Database", CheckStatus::Pass, "connected", start),
            Some(db),
        ),
        Err(e) => (
            CheckResult::new("Database", CheckStatus::Fail, format!("query failed: {e}"), start),
            None,
        ),
    }
}

/// Report the summarization backlog.
///
/// A claim whose lease has lapsed means a reduction failed or its worker died.
async fn check_backlog(db: &Database) -> CheckResult {
    let start = Instant::now();
    let entries = match tripstodo::list(db).await {
        Ok(entries) => entries,
        Err(e) => {
            return CheckResult::new("Work queue", CheckStatus::Fail, format!("{e}"), start);
        }
    };

    let now = Utc::now();
    let expired = entries
        .iter()
        .filter(|entry| {
            entry.claimed_by.is_some()
                && entry
                    .lease_until
                    .as_deref()
                    .and_then(|until| parse_stamp(until).ok())
                    .is_some_and(|until| until <= now)
        })
        .count();
    let claimed = entries.iter().filter(|e| e.claimed_by.is_some()).count();

    let message = format!("{} trip(s) queued, {claimed} claimed", entries.len());
    if expired > 0 {
        CheckResult::new(
            "Work queue",
            CheckStatus::Warn,
            format!("{message}, {expired} with lapsed leases"),
            start,
        )
    } else {
        CheckResult::new("Work queue", CheckStatus::Pass, message, start)
    }
}

/// Report how much has been stored.
async fn check_stored(db: &Database) -> CheckResult {
    let start = Instant::now();
    match (events::count(db).await, trips::count(db).await) {
        (Ok(event_count), Ok(trip_count)) => CheckResult::new(
            "Stored data",
            CheckStatus::Pass,
            format!("{event_count} event(s), {trip_count} trip summary(ies)"),
            start,
        ),
        (Err(e), _) | (_, Err(e)) => {
            CheckResult::new("Stored data", CheckStatus::Fail, format!("{e}"), start)
        }
    }
}
