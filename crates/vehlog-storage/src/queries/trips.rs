// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `trips` summary table.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use vehlog_core::{
    format_stamp, parse_stamp, DataStatus, GlobalPosition, TripStatus, TripSummary, VehlogError,
};

use crate::database::{map_tr_err, Database};

const SUMMARY_COLUMNS: &str = "tripid, stamp, end_time, elapsed, owner_name, shard, object_name,
     driver_key, driver_name, driver_display_name, distance, event_distance, regions_crossed,
     trip_status, data_status, severity, msg, start_region_name, end_region_name,
     min_x, min_y, max_x, max_y, last_eventtypes";

fn conversion_err(
    index: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
}

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TripSummary> {
    let stamp: String = row.get(1)?;
    let trip_status: String = row.get(13)?;
    let data_status: String = row.get(14)?;
    let last_eventtypes: String = row.get(23)?;
    Ok(TripSummary {
        tripid: row.get(0)?,
        stamp: parse_stamp(&stamp).map_err(|e| conversion_err(1, e))?,
        end_time: row.get(2)?,
        elapsed: row.get(3)?,
        owner_name: row.get(4)?,
        shard: row.get(5)?,
        object_name: row.get(6)?,
        driver_key: row.get(7)?,
        driver_name: row.get(8)?,
        driver_display_name: row.get(9)?,
        distance: row.get(10)?,
        event_distance: row.get(11)?,
        regions_crossed: row.get(12)?,
        trip_status: TripStatus::from_str(&trip_status).map_err(|e| conversion_err(13, e))?,
        data_status: DataStatus::from_str(&data_status).map_err(|e| conversion_err(14, e))?,
        severity: row.get(15)?,
        msg: row.get(16)?,
        start_region_name: row.get(17)?,
        end_region_name: row.get(18)?,
        min_pos: GlobalPosition::new(row.get(19)?, row.get(20)?),
        max_pos: GlobalPosition::new(row.get(21)?, row.get(22)?),
        last_eventtypes: serde_json::from_str(&last_eventtypes)
            .map_err(|e| conversion_err(23, e))?,
    })
}

/// Write a trip summary and retire the trip's queue row in one transaction.
///
/// A summary already present for the same trip is left as it is; the queue
/// row is removed either way. Returns `true` when a new row was written.
pub async fn insert_summary_and_clear(
    db: &Database,
    summary: &TripSummary,
) -> Result<bool, VehlogError> {
    let s = summary.clone();
    let stamp = format_stamp(summary.stamp);
    let last_eventtypes = serde_json::to_string(&summary.last_eventtypes)
        .map_err(|e| VehlogError::Internal(format!("encoding event trail: {e}")))?;
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let inserted = tx.execute(
                &format!(
                    "INSERT INTO trips ({SUMMARY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                             ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
                     ON CONFLICT (tripid) DO NOTHING"
                ),
                params![
                    s.tripid,
                    stamp,
                    s.end_time,
                    s.elapsed,
                    s.owner_name,
                    s.shard,
                    s.object_name,
                    s.driver_key,
                    s.driver_name,
                    s.driver_display_name,
                    s.distance,
                    s.event_distance,
                    s.regions_crossed,
                    s.trip_status.to_string(),
                    s.data_status.to_string(),
                    s.severity,
                    s.msg,
                    s.start_region_name,
                    s.end_region_name,
                    s.min_pos.x,
                    s.min_pos.y,
                    s.max_pos.x,
                    s.max_pos.y,
                    last_eventtypes,
                ],
            )?;
            tx.execute("DELETE FROM tripstodo WHERE tripid = ?1", params![s.tripid])?;
            tx.commit()?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the summary for one trip.
pub async fn get_summary(db: &Database, tripid: &str) -> Result<Option<TripSummary>, VehlogError> {
    let tripid = tripid.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SUMMARY_COLUMNS} FROM trips WHERE tripid = ?1"),
                params![tripid],
                summary_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of summarized trips.
pub async fn count(db: &Database) -> Result<i64, VehlogError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM trips", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)
}
