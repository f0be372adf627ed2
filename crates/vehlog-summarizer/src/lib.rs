// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trip summarization for the vehlog trip logger.
//!
//! [`TripReducer`] folds one trip's events into a [`TripSummary`] and
//! stores it; [`TripSummarizer`] decides when and which trips to reduce.
//!
//! [`TripSummary`]: vehlog_core::TripSummary

pub mod reducer;
pub mod scheduler;

pub use reducer::{TripReducer, summarize_events};
pub use scheduler::{CycleOutcome, SummarizerSettings, TripSummarizer};
