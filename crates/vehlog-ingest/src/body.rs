// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strict decoding of the event body.

use vehlog_core::{EventBody, TRIPID_LEN, ValidationError};

/// Decode the raw request body into the event shape.
///
/// Unknown, missing, and mistyped fields all fail; nothing is defaulted.
pub fn parse_event_body(raw: &[u8]) -> Result<EventBody, ValidationError> {
    serde_json::from_slice(raw).map_err(|e| ValidationError::BodyMalformed {
        reason: e.to_string(),
    })
}

/// Check that a trip id is exactly [`TRIPID_LEN`] characters.
///
/// The content is not otherwise constrained.
pub fn validate_tripid(tripid: &str) -> Result<(), ValidationError> {
    let len = tripid.chars().count();
    if len == TRIPID_LEN {
        Ok(())
    } else {
        Err(ValidationError::InvalidTripId { len })
    }
}
