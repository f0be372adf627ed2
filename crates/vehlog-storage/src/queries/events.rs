// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The append-only `events` log.

use chrono::{DateTime, Utc};
use rusqlite::{params, TransactionBehavior};
use vehlog_core::{format_stamp, Event, VehlogError};

use crate::database::{map_tr_err, Database};
use crate::queries::tripstodo::TOUCH_SQL;

const EVENT_COLUMNS: &str = "time, serial, tripid, severity, eventtype, msg, auxval, debug,
     shard, owner_name, object_name, region_name, region_corner_x, region_corner_y,
     local_position_x, local_position_y, local_position_z";

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        timestamp: row.get(0)?,
        serial: row.get(1)?,
        tripid: row.get(2)?,
        severity: row.get(3)?,
        eventtype: row.get(4)?,
        msg: row.get(5)?,
        auxval: row.get(6)?,
        debug: row.get(7)?,
        shard: row.get(8)?,
        owner_name: row.get(9)?,
        object_name: row.get(10)?,
        region_name: row.get(11)?,
        region_corner_x: row.get(12)?,
        region_corner_y: row.get(13)?,
        local_position_x: row.get(14)?,
        local_position_y: row.get(15)?,
        local_position_z: row.get(16)?,
    })
}

/// Store one event and touch its trip's work-queue row in one transaction.
///
/// Either both rows are written or neither is. A second event with the same
/// `(tripid, serial)` fails with [`VehlogError::DuplicateEvent`] and leaves
/// the queue untouched.
pub async fn insert_event_and_touch(
    db: &Database,
    event: &Event,
    received_at: DateTime<Utc>,
) -> Result<(), VehlogError> {
    let ev = event.clone();
    let stamp = format_stamp(received_at);
    let inserted = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let result = tx.execute(
                &format!(
                    "INSERT INTO events ({EVENT_COLUMNS}, received_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                ),
                params![
                    ev.timestamp,
                    ev.serial,
                    ev.tripid,
                    ev.severity,
                    ev.eventtype,
                    ev.msg,
                    ev.auxval,
                    ev.debug,
                    ev.shard,
                    ev.owner_name,
                    ev.object_name,
                    ev.region_name,
                    ev.region_corner_x,
                    ev.region_corner_y,
                    ev.local_position_x,
                    ev.local_position_y,
                    ev.local_position_z,
                    stamp,
                ],
            );
            match result {
                Ok(_) => {}
                // Dropping `tx` rolls back.
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
            tx.execute(TOUCH_SQL, params![ev.tripid, stamp])?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if inserted {
        Ok(())
    } else {
        Err(VehlogError::DuplicateEvent {
            tripid: event.tripid.clone(),
            serial: event.serial,
        })
    }
}

/// All events of one trip, ordered by serial.
pub async fn events_for_trip(db: &Database, tripid: &str) -> Result<Vec<Event>, VehlogError> {
    let tripid = tripid.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE tripid = ?1 ORDER BY serial ASC"
            ))?;
            let rows = stmt.query_map(params![tripid], event_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of stored events, across all trips.
pub async fn count(db: &Database) -> Result<i64, VehlogError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tripstodo;
    use chrono::TimeZone;
    use tempfile::tempdir;

    const TRIP: &str = "4c8650ab4ceeeddeb8d3e31ca950255cc22918b5";

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn event(serial: i32, eventtype: &str) -> Event {
        Event {
            timestamp: 1521264571 + i64::from(serial),
            serial,
            tripid: TRIP.to_string(),
            severity: 1,
            eventtype: eventtype.to_string(),
            msg: "Testing".to_string(),
            auxval: 0.0,
            debug: 0,
            shard: "Production".to_string(),
            owner_name: "animats Resident".to_string(),
            object_name: "Logging tester 0.4".to_string(),
            region_name: "Vallone".to_string(),
            region_corner_x: 462592,
            region_corner_y: 306944,
            local_position_x: 204.783539,
            local_position_y: 26.682831,
            local_position_z: 35.563702,
        }
    }

    #[tokio::test]
    async fn insert_writes_event_and_queue_row() {
        let (db, _dir) = setup_db().await;
        let at = Utc.with_ymd_and_hms(2018, 3, 17, 5, 29, 31).unwrap();

        insert_event_and_touch(&db, &event(0, "STARTUP"), at).await.unwrap();

        assert_eq!(count(&db).await.unwrap(), 1);
        let entry = tripstodo::get(&db, TRIP).await.unwrap().unwrap();
        assert_eq!(entry.stamp, format_stamp(at));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn events_come_back_in_serial_order() {
        let (db, _dir) = setup_db().await;
        let at = Utc::now();
        for (serial, kind) in [(2, "SHUTDOWN"), (0, "STARTUP"), (1, "DRIVERKEY")] {
            insert_event_and_touch(&db, &event(serial, kind), at).await.unwrap();
        }

        let events = events_for_trip(&db, TRIP).await.unwrap();
        let serials: Vec<i32> = events.iter().map(|e| e.serial).collect();
        assert_eq!(serials, vec![0, 1, 2]);
        assert_eq!(events[0], event(0, "STARTUP"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_serial_rolls_back_both_writes() {
        let (db, _dir) = setup_db().await;
        let first = Utc.with_ymd_and_hms(2018, 3, 17, 5, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2018, 3, 17, 6, 0, 0).unwrap();

        insert_event_and_touch(&db, &event(0, "STARTUP"), first).await.unwrap();
        let err = insert_event_and_touch(&db, &event(0, "STARTUP"), second)
            .await
            .unwrap_err();
        assert!(matches!(err, VehlogError::DuplicateEvent { serial: 0, .. }));

        assert_eq!(count(&db).await.unwrap(), 1);
        // The queue stamp was not refreshed by the failed write.
        let entry = tripstodo::get(&db, TRIP).await.unwrap().unwrap();
        assert_eq!(entry.stamp, format_stamp(first));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_trip_has_no_events() {
        let (db, _dir) = setup_db().await;
        assert!(events_for_trip(&db, "nope").await.unwrap().is_empty());
    }
}
