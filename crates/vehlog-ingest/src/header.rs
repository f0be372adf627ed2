// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sender context carried in request headers.
//!
//! Header names are a protocol contract with the in-world scripts that send
//! events. Values are trimmed; a blank value counts as missing and a value
//! that is not UTF-8 is malformed.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use vehlog_core::{EventHeader, LocalPosition, Region, ValidationError};

pub const OWNER_NAME: &str = "X-Secondlife-Owner-Name";
pub const OBJECT_NAME: &str = "X-Secondlife-Object-Name";
pub const SHARD: &str = "X-Secondlife-Shard";
pub const REGION: &str = "X-Secondlife-Region";
pub const LOCAL_POSITION: &str = "X-Secondlife-Local-Position";
pub const AUTHTOKEN_NAME: &str = "X-Authtoken-Name";
pub const AUTHTOKEN_HASH: &str = "X-Authtoken-Hash";

/// Read access to raw request header values.
///
/// Whether `name` is matched exactly or case-insensitively is up to the
/// implementation: the plain string maps here match exactly, while HTTP
/// transports follow their own header-map rules. Values are handed over as
/// bytes so that text which is not UTF-8 can be told apart from an absent
/// field.
pub trait HeaderSource {
    fn header(&self, name: &str) -> Option<&[u8]>;
}

impl<S: BuildHasher> HeaderSource for HashMap<String, String, S> {
    fn header(&self, name: &str) -> Option<&[u8]> {
        self.get(name).map(String::as_bytes)
    }
}

impl HeaderSource for BTreeMap<String, String> {
    fn header(&self, name: &str) -> Option<&[u8]> {
        self.get(name).map(String::as_bytes)
    }
}

/// The trimmed raw value of a header that is present and not blank.
fn present<'a, H>(headers: &'a H, name: &str) -> Result<&'a [u8], ValidationError>
where
    H: HeaderSource + ?Sized,
{
    match headers.header(name).map(<[u8]>::trim_ascii) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ValidationError::HeaderFieldMissing {
            name: name.to_string(),
        }),
    }
}

fn decode<'a>(name: &str, raw: &'a [u8]) -> Result<&'a str, ValidationError> {
    std::str::from_utf8(raw).map_err(|e| malformed(name, format!("not valid UTF-8: {e}")))
}

/// Fetch a required header, trimmed.
///
/// Absent or blank values are missing; bytes that are not UTF-8 are malformed.
pub fn required<'a, H>(headers: &'a H, name: &str) -> Result<&'a str, ValidationError>
where
    H: HeaderSource + ?Sized,
{
    decode(name, present(headers, name)?)
}

fn malformed(name: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::HeaderFieldMalformed {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Split `"(a, b, ...)"` into its trimmed comma-separated parts.
fn parenthesized<'a>(field: &str, text: &'a str) -> Result<Vec<&'a str>, ValidationError> {
    let inner = text
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| malformed(field, "expected a parenthesized list"))?;
    Ok(inner.split(',').map(str::trim).collect())
}

/// Parse a region descriptor such as `"Vallone (462592, 306944)"`.
///
/// The name may itself contain spaces and parentheses; the coordinates are
/// taken from the rightmost parenthesized group.
pub fn parse_region(text: &str) -> Result<Region, ValidationError> {
    let open = text
        .rfind('(')
        .ok_or_else(|| malformed(REGION, "no corner coordinates"))?;
    let name = text[..open].trim();
    if name.is_empty() {
        return Err(malformed(REGION, "empty region name"));
    }
    let parts = parenthesized(REGION, &text[open..])?;
    let &[x, y] = parts.as_slice() else {
        return Err(malformed(REGION, format!("expected 2 coordinates, got {}", parts.len())));
    };
    let coord = |s: &str| {
        s.parse::<i32>()
            .map_err(|e| malformed(REGION, format!("bad coordinate {s:?}: {e}")))
    };
    Ok(Region {
        name: name.to_string(),
        corner_x: coord(x)?,
        corner_y: coord(y)?,
    })
}

/// Parse a local position such as `"(204.783539, 26.682831, 35.563702)"`.
pub fn parse_local_position(text: &str) -> Result<LocalPosition, ValidationError> {
    let parts = parenthesized(LOCAL_POSITION, text)?;
    let &[x, y, z] = parts.as_slice() else {
        return Err(malformed(
            LOCAL_POSITION,
            format!("expected 3 coordinates, got {}", parts.len()),
        ));
    };
    let coord = |s: &str| match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(malformed(LOCAL_POSITION, format!("non-finite coordinate {s:?}"))),
        Err(e) => Err(malformed(LOCAL_POSITION, format!("bad coordinate {s:?}: {e}"))),
    };
    Ok(LocalPosition {
        x: coord(x)?,
        y: coord(y)?,
        z: coord(z)?,
    })
}

/// Extract and parse the sender context.
///
/// Every required field is checked for presence before any is parsed, so a
/// request missing a field reports that rather than a parse failure.
pub fn parse_header<H>(headers: &H) -> Result<EventHeader, ValidationError>
where
    H: HeaderSource + ?Sized,
{
    let owner_name = present(headers, OWNER_NAME)?;
    let object_name = present(headers, OBJECT_NAME)?;
    let shard = present(headers, SHARD)?;
    let region = present(headers, REGION)?;
    let local_position = present(headers, LOCAL_POSITION)?;

    Ok(EventHeader {
        owner_name: decode(OWNER_NAME, owner_name)?.to_string(),
        object_name: decode(OBJECT_NAME, object_name)?.to_string(),
        shard: decode(SHARD, shard)?.to_string(),
        region: parse_region(decode(REGION, region)?)?,
        local_position: parse_local_position(decode(LOCAL_POSITION, local_position)?)?,
    })
}
