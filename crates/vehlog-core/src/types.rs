// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the vehlog workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Length of a trip identifier: the hex form of a 160-bit hash.
pub const TRIPID_LEN: usize = 40;

/// Length of a driver key learned from a `DRIVERKEY` event.
pub const DRIVER_KEY_LEN: usize = 36;

/// A named region with integer-meter corner coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub corner_x: i32,
    pub corner_y: i32,
}

/// Offset of the sender within its region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Region corner plus local offset, in meters. Only the horizontal plane
/// is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub x: f64,
    pub y: f64,
}

impl GlobalPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &GlobalPosition) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Component-wise minimum.
    pub fn min(&self, other: &GlobalPosition) -> GlobalPosition {
        GlobalPosition::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum.
    pub fn max(&self, other: &GlobalPosition) -> GlobalPosition {
        GlobalPosition::new(self.x.max(other.x), self.y.max(other.y))
    }
}

/// Sender context extracted from the request headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHeader {
    pub owner_name: String,
    pub object_name: String,
    pub shard: String,
    pub region: Region,
    pub local_position: LocalPosition,
}

/// The JSON body sent by the vehicle script.
///
/// Decoding is strict: every field is required, unknown fields are
/// rejected, and mistyped values fail rather than defaulting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventBody {
    pub timestamp: i64,
    pub serial: i32,
    pub tripid: String,
    pub severity: i8,
    #[serde(rename = "type")]
    pub eventtype: String,
    pub msg: String,
    pub auxval: f32,
    pub debug: i8,
}

/// One stored telemetry event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the Unix epoch, as reported by the sender.
    pub timestamp: i64,
    pub serial: i32,
    pub tripid: String,
    pub severity: i8,
    pub eventtype: String,
    pub msg: String,
    pub auxval: f64,
    pub debug: i8,
    pub shard: String,
    pub owner_name: String,
    pub object_name: String,
    pub region_name: String,
    pub region_corner_x: i32,
    pub region_corner_y: i32,
    pub local_position_x: f64,
    pub local_position_y: f64,
    pub local_position_z: f64,
}

impl Event {
    /// Combine validated header context and body into one event.
    pub fn from_parts(header: EventHeader, body: EventBody) -> Self {
        Self {
            timestamp: body.timestamp,
            serial: body.serial,
            tripid: body.tripid,
            severity: body.severity,
            eventtype: body.eventtype,
            msg: body.msg,
            auxval: f64::from(body.auxval),
            debug: body.debug,
            shard: header.shard,
            owner_name: header.owner_name,
            object_name: header.object_name,
            region_name: header.region.name,
            region_corner_x: header.region.corner_x,
            region_corner_y: header.region.corner_y,
            local_position_x: header.local_position.x,
            local_position_y: header.local_position.y,
            local_position_z: header.local_position.z,
        }
    }

    pub fn global_position(&self) -> GlobalPosition {
        GlobalPosition::new(
            f64::from(self.region_corner_x) + self.local_position_x,
            f64::from(self.region_corner_y) + self.local_position_y,
        )
    }
}

/// Outcome of the trip itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum TripStatus {
    #[strum(serialize = "OK")]
    #[serde(rename = "OK")]
    Ok,
    /// At least one event reported a failure or error.
    #[strum(serialize = "FAULT")]
    #[serde(rename = "FAULT")]
    Fault,
    /// The last event was not a clean shutdown.
    #[strum(serialize = "NOSHUTDOWN")]
    #[serde(rename = "NOSHUTDOWN")]
    NoShutdown,
}

/// Quality of the event stream the summary was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum DataStatus {
    #[strum(serialize = "OK")]
    #[serde(rename = "OK")]
    Ok,
    /// The stream did not start with `STARTUP` at serial 0, or has a gap.
    #[strum(serialize = "MISSING")]
    #[serde(rename = "MISSING")]
    Missing,
    /// Owner, object, or shard changed mid-trip.
    #[strum(serialize = "INCONSISTENT")]
    #[serde(rename = "INCONSISTENT")]
    Inconsistent,
}

/// One summary row per trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub tripid: String,
    /// When the reduction ran.
    pub stamp: DateTime<Utc>,
    /// Timestamp of the last event by serial.
    pub end_time: i64,
    /// Seconds between the first and last event.
    pub elapsed: i64,
    pub owner_name: String,
    pub shard: String,
    pub object_name: String,
    pub driver_key: Option<String>,
    pub driver_name: String,
    pub driver_display_name: String,
    /// Authoritative distance, from the final `SHUTDOWN` event when present.
    pub distance: f64,
    /// Sum of straight-line hops between consecutive event positions.
    pub event_distance: f64,
    pub regions_crossed: u32,
    pub trip_status: TripStatus,
    pub data_status: DataStatus,
    /// Highest severity seen in the trip.
    pub severity: i8,
    /// Message of the first event that reached `severity`.
    pub msg: String,
    pub start_region_name: String,
    pub end_region_name: String,
    pub min_pos: GlobalPosition,
    pub max_pos: GlobalPosition,
    /// The most recent event types, oldest first.
    pub last_eventtypes: Vec<String>,
}

/// A pending-work marker for one trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub tripid: String,
    /// Last time an event for this trip was written.
    pub stamp: String,
    /// Worker currently holding the claim, if any.
    pub claimed_by: Option<String>,
    pub lease_until: Option<String>,
}
