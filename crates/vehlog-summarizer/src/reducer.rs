// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fold a trip's event stream into its summary row.
//!
//! Events are replayed in serial order. The fold tracks identity and
//! sequence consistency, fault status, region crossings, the bounding box
//! and hop distance of global positions, and a short trail of recent event
//! types. Status downgrades are sticky: once a trip is `FAULT` or its data
//! is `MISSING`/`INCONSISTENT`, later events never restore `OK`.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use vehlog_core::{
    DRIVER_KEY_LEN, DataStatus, Event, GlobalPosition, ReductionError, TripStatus, TripSummary,
    VehlogError,
};
use vehlog_storage::Database;
use vehlog_storage::queries::{events, trips};

const STARTUP: &str = "STARTUP";
const SHUTDOWN: &str = "SHUTDOWN";
const DRIVERKEY: &str = "DRIVERKEY";

fn is_fault(eventtype: &str) -> bool {
    eventtype.contains("FAIL") || eventtype.contains("ERR")
}

/// Running state of one reduction.
struct TripFold {
    owner_name: String,
    object_name: String,
    shard: String,
    driver_key: Option<String>,
    driver_name: String,
    driver_display_name: String,
    trip_status: TripStatus,
    data_status: DataStatus,
    severity: i8,
    msg: String,
    start_region_name: String,
    end_region_name: String,
    regions_crossed: u32,
    min_pos: GlobalPosition,
    max_pos: GlobalPosition,
    event_distance: f64,
    first_timestamp: i64,
    prev_serial: Option<i32>,
    prev_pos: Option<GlobalPosition>,
    trail: VecDeque<String>,
    trail_len: usize,
}

impl TripFold {
    /// Seed the fold from the first event by serial.
    ///
    /// Identity, start region and bounding box always come from the first
    /// event; the driver names only when it is a `STARTUP`.
    fn start(first: &Event, trail_len: usize) -> Self {
        let clean_start = first.eventtype == STARTUP && first.serial == 0;
        let (driver_name, driver_display_name) = if first.eventtype == STARTUP {
            // Only a message with exactly one separator names the driver.
            first
                .msg
                .split_once('/')
                .filter(|(_, display)| !display.contains('/'))
                .map(|(name, display)| (name.trim().to_string(), display.trim().to_string()))
                .unwrap_or_default()
        } else {
            Default::default()
        };
        let pos = first.global_position();

        Self {
            owner_name: first.owner_name.clone(),
            object_name: first.object_name.clone(),
            shard: first.shard.clone(),
            driver_key: None,
            driver_name,
            driver_display_name,
            trip_status: TripStatus::Ok,
            data_status: if clean_start {
                DataStatus::Ok
            } else {
                DataStatus::Missing
            },
            severity: first.severity,
            msg: first.msg.clone(),
            start_region_name: first.region_name.clone(),
            end_region_name: first.region_name.clone(),
            regions_crossed: 0,
            min_pos: pos,
            max_pos: pos,
            event_distance: 0.0,
            first_timestamp: first.timestamp,
            prev_serial: None,
            prev_pos: None,
            trail: VecDeque::with_capacity(trail_len + 1),
            trail_len,
        }
    }

    fn degrade_data(&mut self, to: DataStatus) {
        if self.data_status == DataStatus::Ok {
            self.data_status = to;
        }
    }

    fn observe(&mut self, event: &Event) {
        if event.owner_name != self.owner_name
            || event.object_name != self.object_name
            || event.shard != self.shard
        {
            self.degrade_data(DataStatus::Inconsistent);
        }

        if let Some(prev) = self.prev_serial
            && prev.checked_add(1) != Some(event.serial)
        {
            self.degrade_data(DataStatus::Missing);
        }
        self.prev_serial = Some(event.serial);

        if event.eventtype == DRIVERKEY && self.driver_key.is_none() {
            let key = event.msg.trim();
            if key.chars().count() == DRIVER_KEY_LEN {
                self.driver_key = Some(key.to_string());
            }
        }

        if is_fault(&event.eventtype) && self.trip_status == TripStatus::Ok {
            self.trip_status = TripStatus::Fault;
        }

        if event.severity > self.severity {
            self.severity = event.severity;
            self.msg = event.msg.clone();
        }

        if event.region_name != self.end_region_name {
            self.regions_crossed += 1;
            self.end_region_name = event.region_name.clone();
        }

        let pos = event.global_position();
        self.min_pos = self.min_pos.min(&pos);
        self.max_pos = self.max_pos.max(&pos);
        if let Some(prev) = self.prev_pos {
            self.event_distance += prev.distance(&pos);
        }
        self.prev_pos = Some(pos);

        self.trail.push_back(event.eventtype.clone());
        while self.trail.len() > self.trail_len {
            self.trail.pop_front();
        }
    }

    fn finish(mut self, tripid: &str, last: &Event, as_of: DateTime<Utc>) -> TripSummary {
        let distance = if last.eventtype == SHUTDOWN {
            last.auxval
        } else {
            if self.trip_status == TripStatus::Ok {
                self.trip_status = TripStatus::NoShutdown;
            }
            self.event_distance
        };

        TripSummary {
            tripid: tripid.to_string(),
            stamp: as_of,
            end_time: last.timestamp,
            // Sender clocks are untrusted; extreme values must not overflow.
            elapsed: last.timestamp.saturating_sub(self.first_timestamp),
            owner_name: self.owner_name,
            shard: self.shard,
            object_name: self.object_name,
            driver_key: self.driver_key,
            driver_name: self.driver_name,
            driver_display_name: self.driver_display_name,
            distance,
            event_distance: self.event_distance,
            regions_crossed: self.regions_crossed,
            trip_status: self.trip_status,
            data_status: self.data_status,
            severity: self.severity,
            msg: self.msg,
            start_region_name: self.start_region_name,
            end_region_name: self.end_region_name,
            min_pos: self.min_pos,
            max_pos: self.max_pos,
            last_eventtypes: self.trail.into(),
        }
    }
}

/// Reduce a trip's events, already ordered by serial, to its summary.
///
/// `trail_len` bounds `last_eventtypes`. An empty event list is an error:
/// a queued trip always has at least one stored event.
pub fn summarize_events(
    tripid: &str,
    events: &[Event],
    as_of: DateTime<Utc>,
    trail_len: usize,
) -> Result<TripSummary, ReductionError> {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Err(ReductionError::EmptyTrip {
            tripid: tripid.to_string(),
        });
    };
    debug_assert!(events.is_sorted_by_key(|e| e.serial));

    let mut fold = TripFold::start(first, trail_len);
    for event in events {
        fold.observe(event);
    }
    Ok(fold.finish(tripid, last, as_of))
}

/// Reads a trip's events, folds them, and stores the summary.
#[derive(Debug, Clone)]
pub struct TripReducer {
    db: Database,
    trail_len: usize,
}

impl TripReducer {
    pub fn new(db: Database, trail_len: usize) -> Self {
        Self { db, trail_len }
    }

    /// Summarize one trip as of `as_of`.
    ///
    /// The summary insert and the queue-row delete share one transaction.
    /// Re-reducing an already summarized trip keeps the first summary and
    /// still clears the queue row. On failure nothing is written and the
    /// queue row stays for a later attempt.
    pub async fn reduce(
        &self,
        tripid: &str,
        as_of: DateTime<Utc>,
    ) -> Result<TripSummary, ReductionError> {
        let storage = |e: VehlogError| ReductionError::Storage {
            tripid: tripid.to_string(),
            source: Box::new(e),
        };

        let events = events::events_for_trip(&self.db, tripid)
            .await
            .map_err(storage)?;
        debug!(tripid, events = events.len(), "reducing trip");

        let summary = summarize_events(tripid, &events, as_of, self.trail_len)?;
        let inserted = trips::insert_summary_and_clear(&self.db, &summary)
            .await
            .map_err(storage)?;

        info!(
            tripid,
            trip_status = %summary.trip_status,
            data_status = %summary.data_status,
            distance = summary.distance,
            inserted,
            "trip summarized"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;
    use vehlog_storage::queries::tripstodo;

    const TRIP: &str = "4c8650ab4ceeeddeb8d3e31ca950255cc22918b5";
    const KEY: &str = "123456789012345678901234567890123456";

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 3, 17, 6, 0, 0).unwrap()
    }

    fn ev(serial: i32, eventtype: &str) -> Event {
        Event {
            timestamp: 1521264571 + i64::from(serial) * 10,
            serial,
            tripid: TRIP.to_string(),
            severity: 1,
            eventtype: eventtype.to_string(),
            msg: String::new(),
            auxval: 0.0,
            debug: 0,
            shard: "Production".to_string(),
            owner_name: "animats Resident".to_string(),
            object_name: "Logging tester 0.4".to_string(),
            region_name: "Vallone".to_string(),
            region_corner_x: 462592,
            region_corner_y: 306944,
            local_position_x: 10.0,
            local_position_y: 20.0,
            local_position_z: 30.0,
        }
    }

    fn trip(kinds: &[&str]) -> Vec<Event> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| ev(i as i32, kind))
            .collect()
    }

    fn reduce(events: &[Event]) -> TripSummary {
        summarize_events(TRIP, events, as_of(), 5).unwrap()
    }

    #[test]
    fn clean_trip_is_ok() {
        let mut events = trip(&["STARTUP", "TEST", "TEST", "SHUTDOWN"]);
        events[3].auxval = 42.5;
        let s = reduce(&events);

        assert_eq!(s.data_status, DataStatus::Ok);
        assert_eq!(s.trip_status, TripStatus::Ok);
        assert_eq!(s.distance, 42.5);
        assert_eq!(s.elapsed, 30);
        assert_eq!(s.end_time, events[3].timestamp);
        assert_eq!(s.stamp, as_of());
        assert_eq!(s.owner_name, "animats Resident");
    }

    #[test]
    fn serial_gap_is_missing() {
        let mut events = trip(&["STARTUP", "TEST", "TEST", "SHUTDOWN"]);
        events[2].serial = 5;
        events.sort_by_key(|e| e.serial);
        assert_eq!(reduce(&events).data_status, DataStatus::Missing);
    }

    #[test]
    fn trip_not_starting_with_startup_is_missing() {
        let events = trip(&["TEST", "TEST", "SHUTDOWN"]);
        let s = reduce(&events);
        assert_eq!(s.data_status, DataStatus::Missing);
        assert_eq!(s.owner_name, "animats Resident");
        assert_eq!(s.start_region_name, "Vallone");

        let mut late_start = trip(&["STARTUP", "SHUTDOWN"]);
        for e in &mut late_start {
            e.serial += 1;
        }
        assert_eq!(reduce(&late_start).data_status, DataStatus::Missing);
    }

    #[test]
    fn identity_change_is_sticky_inconsistent() {
        let mut events = trip(&["STARTUP", "TEST", "TEST", "SHUTDOWN"]);
        events[2].owner_name = "someone Else".into();
        assert_eq!(reduce(&events).data_status, DataStatus::Inconsistent);

        let mut shard_change = trip(&["STARTUP", "TEST", "SHUTDOWN"]);
        shard_change[1].shard = "Beta".into();
        assert_eq!(reduce(&shard_change).data_status, DataStatus::Inconsistent);
    }

    #[test]
    fn first_degradation_wins() {
        let mut events = trip(&["STARTUP", "TEST", "TEST", "TEST", "SHUTDOWN"]);
        events[1].object_name = "other object".into();
        events[3].serial = 7;
        events[4].serial = 8;
        assert_eq!(reduce(&events).data_status, DataStatus::Inconsistent);
    }

    #[test]
    fn fault_survives_clean_shutdown() {
        let events = trip(&["STARTUP", "CONNFAIL", "TEST", "SHUTDOWN"]);
        assert_eq!(reduce(&events).trip_status, TripStatus::Fault);

        let events = trip(&["STARTUP", "SCRIPTERROR", "SHUTDOWN"]);
        assert_eq!(reduce(&events).trip_status, TripStatus::Fault);
    }

    #[test]
    fn missing_shutdown_is_noshutdown_unless_faulted() {
        let s = reduce(&trip(&["STARTUP", "TEST"]));
        assert_eq!(s.trip_status, TripStatus::NoShutdown);

        let s = reduce(&trip(&["STARTUP", "ENGINEFAIL", "TEST"]));
        assert_eq!(s.trip_status, TripStatus::Fault);
    }

    #[test]
    fn bounding_box_and_hop_distance() {
        let mut events = trip(&["STARTUP", "TEST", "TEST"]);
        for (e, (x, y)) in events.iter_mut().zip([(0.0, 0.0), (3.0, 4.0), (-1.0, 2.0)]) {
            e.region_corner_x = 0;
            e.region_corner_y = 0;
            e.local_position_x = x;
            e.local_position_y = y;
        }
        let s = reduce(&events);

        assert_eq!(s.min_pos, GlobalPosition::new(-1.0, 0.0));
        assert_eq!(s.max_pos, GlobalPosition::new(3.0, 4.0));
        let expected = 5.0 + 32f64.sqrt();
        assert!((s.event_distance - expected).abs() < 1e-9);
        assert!((s.event_distance - 10.657).abs() < 1e-3);
        // No SHUTDOWN, so the hop distance stands in.
        assert_eq!(s.distance, s.event_distance);
    }

    #[test]
    fn positions_include_region_corner() {
        let mut events = trip(&["STARTUP", "SHUTDOWN"]);
        events[1].region_name = "Rubicon".into();
        events[1].region_corner_x = 462848;
        events[1].local_position_x = 10.0;
        let s = reduce(&events);
        assert_eq!(s.min_pos.x, 462602.0);
        assert_eq!(s.max_pos.x, 462858.0);
        assert_eq!(s.event_distance, 256.0);
    }

    #[test]
    fn driver_key_is_trimmed_and_first_one_wins() {
        let mut events = trip(&["STARTUP", "DRIVERKEY", "DRIVERKEY", "DRIVERKEY", "SHUTDOWN"]);
        events[1].msg = "too short".into();
        events[2].msg = format!("  {KEY}  ");
        events[3].msg = "abcdefabcdefabcdefabcdefabcdefabcdef".into();
        let s = reduce(&events);
        assert_eq!(s.driver_key.as_deref(), Some(KEY));
        assert_eq!(s.data_status, DataStatus::Ok);
    }

    #[test]
    fn startup_message_names_the_driver() {
        let mut events = trip(&["STARTUP", "SHUTDOWN"]);
        events[0].msg = "Joe / Joe Magarac".into();
        let s = reduce(&events);
        assert_eq!(s.driver_name, "Joe");
        assert_eq!(s.driver_display_name, "Joe Magarac");

        events[0].msg = "no separator".into();
        let s = reduce(&events);
        assert_eq!(s.driver_name, "");
        assert_eq!(s.driver_display_name, "");
    }

    #[test]
    fn driver_names_need_exactly_two_parts() {
        let mut events = trip(&["STARTUP", "SHUTDOWN"]);
        events[0].msg = "Joe/Joe Magarac/extra".into();
        let s = reduce(&events);
        assert_eq!(s.driver_name, "");
        assert_eq!(s.driver_display_name, "");
    }

    #[test]
    fn extreme_timestamps_saturate_elapsed() {
        let mut events = trip(&["STARTUP", "SHUTDOWN"]);
        events[0].timestamp = i64::MIN;
        events[1].timestamp = i64::MAX;
        let s = reduce(&events);
        assert_eq!(s.elapsed, i64::MAX);
        assert_eq!(s.end_time, i64::MAX);

        events[0].timestamp = i64::MAX;
        events[1].timestamp = i64::MIN;
        assert_eq!(reduce(&events).elapsed, i64::MIN);
    }

    #[test]
    fn region_crossings_count_changes() {
        let mut events = trip(&["STARTUP", "TEST", "TEST", "TEST", "SHUTDOWN"]);
        events[2].region_name = "Rubicon".into();
        events[3].region_name = "Vallone".into();
        events[4].region_name = "Vallone".into();
        let s = reduce(&events);
        assert_eq!(s.regions_crossed, 2);
        assert_eq!(s.start_region_name, "Vallone");
        assert_eq!(s.end_region_name, "Vallone");
    }

    #[test]
    fn severity_is_max_with_first_message_at_max() {
        let mut events = trip(&["STARTUP", "TEST", "TEST", "SHUTDOWN"]);
        events[1].severity = 3;
        events[1].msg = "first bad".into();
        events[2].severity = 3;
        events[2].msg = "second bad".into();
        let s = reduce(&events);
        assert_eq!(s.severity, 3);
        assert_eq!(s.msg, "first bad");
    }

    #[test]
    fn trail_keeps_most_recent_types() {
        let events = trip(&["STARTUP", "A", "B", "C", "D", "E", "SHUTDOWN"]);
        let s = summarize_events(TRIP, &events, as_of(), 3).unwrap();
        assert_eq!(s.last_eventtypes, vec!["D", "E", "SHUTDOWN"]);

        let s = reduce(&trip(&["STARTUP", "SHUTDOWN"]));
        assert_eq!(s.last_eventtypes, vec!["STARTUP", "SHUTDOWN"]);
    }

    #[test]
    fn empty_trip_is_an_error() {
        let err = summarize_events(TRIP, &[], as_of(), 5).unwrap_err();
        assert!(matches!(err, ReductionError::EmptyTrip { .. }));
        assert_eq!(err.tripid(), TRIP);
    }

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn reducing_twice_leaves_one_summary_and_no_queue_row() {
        let (db, _dir) = setup_db().await;
        for event in trip(&["STARTUP", "TEST", "SHUTDOWN"]) {
            events::insert_event_and_touch(&db, &event, as_of()).await.unwrap();
        }
        let reducer = TripReducer::new(db.clone(), 5);

        let first = reducer.reduce(TRIP, as_of()).await.unwrap();
        reducer
            .reduce(TRIP, as_of() + chrono::Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(trips::count(&db).await.unwrap(), 1);
        assert!(tripstodo::get(&db, TRIP).await.unwrap().is_none());
        let stored = trips::get_summary(&db, TRIP).await.unwrap().unwrap();
        assert_eq!(stored.stamp, first.stamp);
    }

    #[tokio::test]
    async fn queued_trip_without_events_keeps_its_queue_row() {
        let (db, _dir) = setup_db().await;
        tripstodo::touch(&db, TRIP, as_of()).await.unwrap();
        let reducer = TripReducer::new(db.clone(), 5);

        let err = reducer.reduce(TRIP, as_of()).await.unwrap_err();
        assert!(matches!(err, ReductionError::EmptyTrip { .. }));
        assert!(tripstodo::get(&db, TRIP).await.unwrap().is_some());
        assert_eq!(trips::count(&db).await.unwrap(), 0);
    }
}
