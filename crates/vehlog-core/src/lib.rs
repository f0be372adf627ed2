// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the vehlog trip logger.
//!
//! This crate provides the domain types shared by every other crate in the
//! workspace: inbound events and their sender context, trip summaries with
//! their closed status enums, the work-queue entry, the error taxonomy, and
//! the injectable [`Clock`].

pub mod clock;
pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SystemClock, format_stamp, parse_stamp};
pub use error::{AuthError, ReductionError, ValidationError, VehlogError};
pub use types::{
    DataStatus, Event, EventBody, EventHeader, GlobalPosition, LocalPosition, QueueEntry, Region,
    TripStatus, TripSummary, DRIVER_KEY_LEN, TRIPID_LEN,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehlog_error_wraps_every_category() {
        let auth: VehlogError = AuthError::UnknownToken {
            name: "TEST".into(),
        }
        .into();
        assert!(matches!(auth, VehlogError::Auth(_)));

        let validation: VehlogError = ValidationError::InvalidTripId { len: 3 }.into();
        assert!(matches!(validation, VehlogError::Validation(_)));

        let reduction: VehlogError = ReductionError::EmptyTrip {
            tripid: "t".into(),
        }
        .into();
        assert!(matches!(reduction, VehlogError::Reduction(_)));

        let _storage = VehlogError::Storage {
            source: Box::new(std::io::Error::other("disk")),
        };
        let _dup = VehlogError::DuplicateEvent {
            tripid: "t".into(),
            serial: 0,
        };
        let _config = VehlogError::Config("bad".into());
        let _internal = VehlogError::Internal("oops".into());
    }

    #[test]
    fn status_enums_round_trip_through_wire_names() {
        use std::str::FromStr;

        for status in [TripStatus::Ok, TripStatus::Fault, TripStatus::NoShutdown] {
            let s = status.to_string();
            assert_eq!(TripStatus::from_str(&s).expect("should parse back"), status);
        }
        for status in [DataStatus::Ok, DataStatus::Missing, DataStatus::Inconsistent] {
            let s = status.to_string();
            assert_eq!(DataStatus::from_str(&s).expect("should parse back"), status);
        }
        assert_eq!(TripStatus::NoShutdown.to_string(), "NOSHUTDOWN");
        assert_eq!(DataStatus::Inconsistent.to_string(), "INCONSISTENT");
    }
}
