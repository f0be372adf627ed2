// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated event ingestion for the vehlog trip logger.
//!
//! An inbound request is a raw JSON body plus a set of header fields. The
//! [`AuthValidator`] checks the keyed hash over the raw body, then the
//! [`EventIngestor`] parses the sender context out of the headers, decodes
//! the body strictly, and writes the event together with its trip's
//! work-queue touch in one transaction.

pub mod auth;
pub mod body;
pub mod header;
pub mod ingestor;

pub use auth::{AuthValidator, hash_with_token};
pub use body::{parse_event_body, validate_tripid};
pub use header::{HeaderSource, parse_header, parse_local_position, parse_region};
pub use ingestor::{EventIngestor, parse_event};
