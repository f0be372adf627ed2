// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes within one process.
//! Separate processes sharing the file are coordinated by SQLite's own locking
//! (`BEGIN IMMEDIATE` transactions plus `busy_timeout`).

use std::path::Path;

use tracing::debug;
use vehlog_config::model::StorageConfig;
use vehlog_core::VehlogError;

use crate::migrations::run_migrations;

/// How long a writer waits on another process's lock before failing.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Handle to the vehlog database.
///
/// Cloning is cheap: clones share the same background connection thread.
#[derive(Debug, Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and
    /// apply pending migrations.
    pub async fn open(path: &str) -> Result<Self, VehlogError> {
        Self::open_with_options(path, true).await
    }

    /// Open the database described by the storage configuration.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, VehlogError> {
        Self::open_with_options(&config.database_path, config.wal_mode).await
    }

    async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, VehlogError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| VehlogError::Storage {
                source: Box::new(e),
            })?;
        }

        // Migrations run on a short-lived blocking connection; journal_mode
        // is persistent in the file, so it is set there too.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), VehlogError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(storage_err)?;
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            conn.pragma_update_and_check(None, "journal_mode", journal, |row| {
                row.get::<_, String>(0)
            })
            .map_err(storage_err)?;
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| VehlogError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| VehlogError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_millis(u64::from(BUSY_TIMEOUT_MS)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main file is self-contained.
    pub async fn close(&self) -> Result<(), VehlogError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Cheap liveness check.
    pub async fn health_check(&self) -> Result<(), VehlogError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT 1", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)
    }
}

fn storage_err(e: rusqlite::Error) -> VehlogError {
    VehlogError::Storage {
        source: Box::new(e),
    }
}

/// Convert a tokio-rusqlite error into VehlogError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> VehlogError {
    VehlogError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("vehlog.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        assert!(db_path.exists(), "database file should be created");

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table'
                     AND name IN ('events', 'tripstodo', 'trips') ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        assert_eq!(tables, vec!["events", "trips", "tripstodo"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("twice.db");
        let path = db_path.to_str().unwrap();

        let first = Database::open(path).await.unwrap();
        first.close().await.unwrap();
        let second = Database::open(path).await.unwrap();
        second.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn from_config_honours_wal_setting() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("wal.db");
        let config = StorageConfig {
            database_path: db_path.to_str().unwrap().to_string(),
            wal_mode: true,
        };
        let db = Database::from_config(&config).await.unwrap();
        let mode: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
