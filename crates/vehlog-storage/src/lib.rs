// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the vehlog trip logger.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations over the three
//! relations: the append-only `events` log, the `tripstodo` work queue, and
//! the `trips` summaries. Every multi-row write runs in one transaction.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::Database;
