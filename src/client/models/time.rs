//! Vision One timestamp codec
//!
//! The API emits `2006-01-02T15:04:05Z` but older records and some filters
//! use the bare `2006-01-02T15:04:05` form. An empty string means "unset".

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Layout without zone designator
pub const TIME_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S";

/// Layout with trailing `Z`
pub const TIME_LAYOUT_Z: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parse a timestamp in either known layout.
pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    [TIME_LAYOUT, TIME_LAYOUT_Z]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(s, layout).ok())
        .map(|naive| naive.and_utc())
}

/// Format with the `Z` layout.
pub fn format(t: &DateTime<Utc>) -> String {
    t.format(TIME_LAYOUT_Z).to_string()
}

/// Serde adapter for `Option<DateTime<Utc>>` fields.
pub mod optional {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_str(&format(t)),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse(s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {:?}", s))),
        }
    }
}
