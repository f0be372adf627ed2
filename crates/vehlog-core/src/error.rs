// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the vehlog trip logger.
//!
//! Every category maps to one caller-visible outcome: authentication and
//! validation failures reject the request without persisting anything,
//! storage failures roll back the enclosing transaction, and reduction
//! failures abort one trip (and the current cycle) while leaving its
//! work-queue entry in place.

use thiserror::Error;

/// The primary error type returned by every public vehlog operation.
#[derive(Debug, Error)]
pub enum VehlogError {
    /// Configuration errors (invalid TOML, missing keys, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The sender failed the keyed-hash integrity check.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The inbound event was malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage backend errors (connection, query failure, constraint).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An event with the same `(tripid, serial)` key was already stored.
    #[error("duplicate event: trip {tripid} already has serial {serial}")]
    DuplicateEvent { tripid: String, serial: i32 },

    /// Summarizing one trip failed.
    #[error(transparent)]
    Reduction(#[from] ReductionError),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Integrity failures of the shared-secret hash check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No shared secret is configured under this authtoken name.
    #[error("logging authorization token {name} not recognized")]
    UnknownToken { name: String },

    /// The supplied hash does not match the hash of secret and body.
    #[error("logging authorization token {name} failed to validate")]
    HashMismatch { name: String },
}

/// Structural failures of an inbound event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required header field was absent or blank.
    #[error("required header field `{name}` is missing")]
    HeaderFieldMissing { name: String },

    /// A header field was present but could not be parsed.
    #[error("header field `{name}` is malformed: {reason}")]
    HeaderFieldMalformed { name: String, reason: String },

    /// The body did not decode into the event shape.
    #[error("event body is malformed: {reason}")]
    BodyMalformed { reason: String },

    /// The trip identifier is not exactly 40 characters long.
    #[error("trip id must be exactly 40 characters, got {len}")]
    InvalidTripId { len: usize },
}

/// Failures while folding one trip into its summary.
#[derive(Debug, Error)]
pub enum ReductionError {
    /// A work-queue entry exists for a trip with no stored events.
    #[error("trip {tripid} is queued for summarization but has no events")]
    EmptyTrip { tripid: String },

    /// Reading events or writing the summary failed.
    #[error("summarizing trip {tripid} failed: {source}")]
    Storage {
        tripid: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ReductionError {
    /// The trip this failure belongs to.
    pub fn tripid(&self) -> &str {
        match self {
            Self::EmptyTrip { tripid } | Self::Storage { tripid, .. } => tripid,
        }
    }
}
