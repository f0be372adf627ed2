// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validate one inbound event and persist it.

use std::sync::Arc;

use tracing::{debug, warn};
use vehlog_core::{Clock, Event, ValidationError, VehlogError};
use vehlog_storage::Database;
use vehlog_storage::queries::events;

use crate::body::{parse_event_body, validate_tripid};
use crate::header::{HeaderSource, parse_header};

/// Turn headers and raw body into an [`Event`], short-circuiting on the
/// first failure: header presence, header syntax, body shape, trip id.
pub fn parse_event<H>(raw_body: &[u8], headers: &H) -> Result<Event, ValidationError>
where
    H: HeaderSource + ?Sized,
{
    let header = parse_header(headers)?;
    let body = parse_event_body(raw_body)?;
    validate_tripid(&body.tripid)?;
    Ok(Event::from_parts(header, body))
}

/// Writes validated events and keeps the summarization queue current.
///
/// Authentication is not done here; callers run the
/// [`AuthValidator`](crate::AuthValidator) first.
#[derive(Clone)]
pub struct EventIngestor {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EventIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventIngestor").finish_non_exhaustive()
    }
}

impl EventIngestor {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Parse, validate, and store one event.
    ///
    /// On success the event row and its trip's queue touch are committed
    /// together; on any failure nothing is written.
    pub async fn ingest<H>(&self, raw_body: &[u8], headers: &H) -> Result<Event, VehlogError>
    where
        H: HeaderSource + ?Sized,
    {
        let event = parse_event(raw_body, headers).inspect_err(|e| {
            debug!(error = %e, "rejected malformed event");
        })?;

        let received_at = self.clock.now();
        if let Err(e) = events::insert_event_and_touch(&self.db, &event, received_at).await {
            warn!(
                tripid = %event.tripid,
                serial = event.serial,
                error = %e,
                "failed to store event"
            );
            return Err(e);
        }

        debug!(
            tripid = %event.tripid,
            serial = event.serial,
            eventtype = %event.eventtype,
            "event stored"
        );
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::header::{LOCAL_POSITION, OBJECT_NAME, OWNER_NAME, REGION, SHARD};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;
    use vehlog_core::{ManualClock, format_stamp};
    use vehlog_storage::queries::tripstodo;

    const TRIP: &str = "4c8650ab4ceeeddeb8d3e31ca950255cc22918b5";

    async fn setup() -> (EventIngestor, Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2018, 3, 17, 5, 29, 31).unwrap(),
        ));
        (EventIngestor::new(db.clone(), clock), db, dir)
    }

    fn headers() -> HashMap<String, String> {
        [
            (OWNER_NAME, "animats Resident"),
            (OBJECT_NAME, "Logging tester 0.4"),
            (SHARD, "Production"),
            (REGION, "Vallone (462592, 306944)"),
            (LOCAL_POSITION, "(204.783539, 26.682831, 35.563702)"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn body(tripid: &str, serial: i32) -> Vec<u8> {
        format!(
            r#"{{"timestamp":1521264571,"serial":{serial},"tripid":"{tripid}","severity":2,"type":"STARTUP","msg":"Joe/Joe Magarac","auxval":1.0,"debug":0}}"#
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn stores_event_and_touches_queue() {
        let (ingestor, db, _dir) = setup().await;

        let event = ingestor.ingest(&body(TRIP, 0), &headers()).await.unwrap();
        assert_eq!(event.region_corner_x, 462592);
        assert_eq!(event.owner_name, "animats Resident");

        let stored = events::events_for_trip(&db, TRIP).await.unwrap();
        assert_eq!(stored, vec![event]);
        let entry = tripstodo::get(&db, TRIP).await.unwrap().unwrap();
        assert_eq!(
            entry.stamp,
            format_stamp(Utc.with_ymd_and_hms(2018, 3, 17, 5, 29, 31).unwrap())
        );
    }

    #[tokio::test]
    async fn short_trip_id_writes_nothing() {
        let (ingestor, db, _dir) = setup().await;

        let err = ingestor.ingest(&body("ABCDEF", 0), &headers()).await.unwrap_err();
        assert!(matches!(
            err,
            VehlogError::Validation(ValidationError::InvalidTripId { len: 6 })
        ));
        assert_eq!(events::count(&db).await.unwrap(), 0);
        assert!(tripstodo::list(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn header_problems_are_reported_before_body_problems() {
        let (ingestor, _db, _dir) = setup().await;
        let mut h = headers();
        h.remove(REGION);

        let err = ingestor.ingest(b"not json", &h).await.unwrap_err();
        assert!(matches!(
            err,
            VehlogError::Validation(ValidationError::HeaderFieldMissing { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (ingestor, db, _dir) = setup().await;

        let err = ingestor.ingest(b"{\"tripid\":1}", &headers()).await.unwrap_err();
        assert!(matches!(
            err,
            VehlogError::Validation(ValidationError::BodyMalformed { .. })
        ));
        assert_eq!(events::count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn resent_event_is_a_duplicate() {
        let (ingestor, db, _dir) = setup().await;

        ingestor.ingest(&body(TRIP, 0), &headers()).await.unwrap();
        let err = ingestor.ingest(&body(TRIP, 0), &headers()).await.unwrap_err();
        assert!(matches!(err, VehlogError::DuplicateEvent { serial: 0, .. }));
        assert_eq!(events::count(&db).await.unwrap(), 1);
    }
}
