// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for signed inbound events.

use std::collections::HashMap;

use vehlog_core::EventBody;
use vehlog_ingest::hash_with_token;
use vehlog_ingest::header::{
    AUTHTOKEN_HASH, AUTHTOKEN_NAME, LOCAL_POSITION, OBJECT_NAME, OWNER_NAME, REGION, SHARD,
};

/// Authtoken name the harness validator knows.
pub const TEST_TOKEN_NAME: &str = "TEST";
/// Shared secret for [`TEST_TOKEN_NAME`].
pub const TEST_TOKEN_SECRET: &str = "test-secret";

/// One event as a sender would post it: a JSON body plus headers carrying
/// sender context and the keyed hash of that exact body.
#[derive(Debug, Clone)]
pub struct SignedEvent {
    pub body: EventBody,
    pub owner_name: String,
    pub object_name: String,
    pub shard: String,
    pub region: String,
    pub local_position: String,
    pub token_name: String,
    pub token_secret: String,
}

impl SignedEvent {
    pub fn new(tripid: &str, serial: i32, eventtype: &str) -> Self {
        Self {
            body: EventBody {
                timestamp: 1521264571 + i64::from(serial),
                serial,
                tripid: tripid.to_string(),
                severity: 1,
                eventtype: eventtype.to_string(),
                msg: String::new(),
                auxval: 0.0,
                debug: 0,
            },
            owner_name: "animats Resident".to_string(),
            object_name: "Logging tester 0.4".to_string(),
            shard: "Production".to_string(),
            region: "Vallone (462592, 306944)".to_string(),
            local_position: "(204.783539, 26.682831, 35.563702)".to_string(),
            token_name: TEST_TOKEN_NAME.to_string(),
            token_secret: TEST_TOKEN_SECRET.to_string(),
        }
    }

    pub fn msg(mut self, msg: &str) -> Self {
        self.body.msg = msg.to_string();
        self
    }

    pub fn auxval(mut self, auxval: f32) -> Self {
        self.body.auxval = auxval;
        self
    }

    pub fn severity(mut self, severity: i8) -> Self {
        self.body.severity = severity;
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.body.timestamp = timestamp;
        self
    }

    pub fn owner_name(mut self, owner_name: &str) -> Self {
        self.owner_name = owner_name.to_string();
        self
    }

    pub fn region(mut self, name: &str, corner_x: i32, corner_y: i32) -> Self {
        self.region = format!("{name} ({corner_x}, {corner_y})");
        self
    }

    pub fn position(mut self, x: f64, y: f64, z: f64) -> Self {
        self.local_position = format!("({x}, {y}, {z})");
        self
    }

    /// Sign with a different token name and secret.
    pub fn signed_with(mut self, name: &str, secret: &str) -> Self {
        self.token_name = name.to_string();
        self.token_secret = secret.to_string();
        self
    }

    /// The raw JSON body.
    pub fn body_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.body).unwrap_or_default()
    }

    /// Headers for [`Self::body_bytes`], including the keyed hash.
    pub fn headers(&self) -> HashMap<String, String> {
        let hash = hash_with_token(self.token_secret.as_bytes(), &self.body_bytes());
        [
            (OWNER_NAME, self.owner_name.clone()),
            (OBJECT_NAME, self.object_name.clone()),
            (SHARD, self.shard.clone()),
            (REGION, self.region.clone()),
            (LOCAL_POSITION, self.local_position.clone()),
            (AUTHTOKEN_NAME, self.token_name.clone()),
            (AUTHTOKEN_HASH, hash),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vehlog_ingest::{AuthValidator, parse_event};

    #[test]
    fn signature_matches_body() {
        let event = SignedEvent::new(&"a".repeat(40), 0, "STARTUP").msg("Joe/Joe Magarac");
        let validator = AuthValidator::new([(TEST_TOKEN_NAME, TEST_TOKEN_SECRET)]);
        validator
            .validate_headers(&event.body_bytes(), &event.headers())
            .unwrap();
    }

    #[test]
    fn builder_output_parses() {
        let event = SignedEvent::new(&"a".repeat(40), 3, "TEST")
            .region("Rubicon", 462848, 306944)
            .position(1.5, 2.0, 0.0);
        let parsed = parse_event(&event.body_bytes(), &event.headers()).unwrap();
        assert_eq!(parsed.region_name, "Rubicon");
        assert_eq!(parsed.region_corner_x, 462848);
        assert_eq!(parsed.local_position_x, 1.5);
        assert_eq!(parsed.serial, 3);
    }
}
