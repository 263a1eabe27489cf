// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Millisecond timestamps and their parsing.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::de::{self, Deserialize, Deserializer, Visitor};

use crate::error::{TelemetryError, TelemetryResult};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub const SECOND_MS: i64 = 1_000;
pub const MINUTE_MS: i64 = 60 * SECOND_MS;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Current wall-clock time in milliseconds.
///
/// Only edges of the system (CLI, span recorder) read the clock; the
/// pipeline operations always take the reference time as a parameter.
pub fn now_ms() -> Timestamp {
    Utc::now().timestamp_millis()
}

/// Parse a timestamp given either as integer epoch milliseconds or RFC 3339.
pub fn parse_timestamp(value: &str) -> TelemetryResult<Timestamp> {
    let trimmed = value.trim();
    if let Ok(ms) = trimmed.parse::<i64>() {
        return Ok(ms);
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|e| TelemetryError::invalid("timestamp", format!("{trimmed:?}: {e}")))
}

/// Render a timestamp as RFC 3339 with millisecond precision.
pub fn format_timestamp(ts: Timestamp) -> String {
    match Utc.timestamp_millis_opt(ts).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ts.to_string(),
    }
}

/// A millisecond quantity read from any JSON number.
///
/// Fractional values (as produced by high-resolution timers) round half
/// away from zero to whole milliseconds.
struct Millis(i64);

struct MillisVisitor;

impl<'de> Visitor<'de> for MillisVisitor {
    type Value = Millis;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number of milliseconds")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Millis, E> {
        Ok(Millis(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Millis, E> {
        i64::try_from(v)
            .map(Millis)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Millis, E> {
        let rounded = v.round();
        if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
            return Err(E::invalid_value(de::Unexpected::Float(v), &self));
        }
        Ok(Millis(rounded as i64))
    }
}

impl<'de> Deserialize<'de> for Millis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MillisVisitor)
    }
}

/// `deserialize_with` helper for millisecond fields.
pub(crate) fn deserialize_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Millis::deserialize(deserializer).map(|m| m.0)
}

/// `deserialize_with` helper for optional millisecond fields.
pub(crate) fn deserialize_opt_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Millis>::deserialize(deserializer).map(|m| m.map(|m| m.0))
}
