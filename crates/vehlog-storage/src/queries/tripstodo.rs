// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `tripstodo` work queue: one row per trip awaiting summarization.
//!
//! Rows are upserted on every event write, claimed by a summarizer with a
//! time-limited lease, and deleted when the trip summary is written.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use vehlog_core::{format_stamp, QueueEntry, VehlogError};

use crate::database::{map_tr_err, Database};

/// Insert the queue row for a trip, or refresh its stamp if present.
pub(crate) const TOUCH_SQL: &str = "INSERT INTO tripstodo (tripid, stamp) VALUES (?1, ?2)
     ON CONFLICT (tripid) DO UPDATE SET stamp = excluded.stamp";

/// Select-and-lease in one statement, so two workers can never claim the
/// same row.
const CLAIM_SQL: &str = "UPDATE tripstodo
     SET claimed_by = ?1, lease_until = ?2
     WHERE tripid = (
         SELECT tripid FROM tripstodo
         WHERE stamp < ?3 AND (lease_until IS NULL OR lease_until < ?4)
         ORDER BY stamp ASC, tripid ASC
         LIMIT 1
     )
     RETURNING tripid, stamp, claimed_by, lease_until";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        tripid: row.get(0)?,
        stamp: row.get(1)?,
        claimed_by: row.get(2)?,
        lease_until: row.get(3)?,
    })
}

/// Mark a trip as having pending work as of `at`.
pub async fn touch(db: &Database, tripid: &str, at: DateTime<Utc>) -> Result<(), VehlogError> {
    let tripid = tripid.to_string();
    let stamp = format_stamp(at);
    db.connection()
        .call(move |conn| {
            conn.execute(TOUCH_SQL, params![tripid, stamp])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the oldest trip last touched before `stale_before` whose lease (if
/// any) has expired by `now`.
///
/// The claim lasts until `lease_until`; a worker that crashes mid-reduction
/// simply lets it lapse. Returns `None` when nothing is eligible.
pub async fn claim_oldest_stale(
    db: &Database,
    worker: &str,
    stale_before: DateTime<Utc>,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
) -> Result<Option<QueueEntry>, VehlogError> {
    let worker = worker.to_string();
    let stale_before = format_stamp(stale_before);
    let now = format_stamp(now);
    let lease_until = format_stamp(lease_until);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                CLAIM_SQL,
                params![worker, lease_until, stale_before, now],
                entry_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the queue row for one trip.
pub async fn get(db: &Database, tripid: &str) -> Result<Option<QueueEntry>, VehlogError> {
    let tripid = tripid.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT tripid, stamp, claimed_by, lease_until FROM tripstodo WHERE tripid = ?1",
                params![tripid],
                entry_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All pending trips, oldest first.
pub async fn list(db: &Database) -> Result<Vec<QueueEntry>, VehlogError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tripid, stamp, claimed_by, lease_until FROM tripstodo
                 ORDER BY stamp ASC, tripid ASC",
            )?;
            let rows = stmt.query_map([], entry_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
