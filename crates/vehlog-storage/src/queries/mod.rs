// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the three vehlog relations.

pub mod events;
pub mod trips;
pub mod tripstodo;
