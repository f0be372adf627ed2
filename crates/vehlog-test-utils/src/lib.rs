// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for vehlog integration tests.
//!
//! # Components
//!
//! - [`TestHarness`] - temp database, manual clock, and the full
//!   ingest/summarize stack wired together
//! - [`SignedEvent`] - builder for request bodies and correctly signed
//!   header sets

pub mod harness;
pub mod signed;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use signed::{SignedEvent, TEST_TOKEN_NAME, TEST_TOKEN_SECRET};
