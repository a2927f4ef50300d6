//! Timestamp normalization.
//!
//! Board data arrives as ISO-8601 strings that may or may not carry an
//! offset. Everything downstream compares UTC instants, so offsets are applied
//! here and naive values are read in the configured default zone.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{DuebellError, Result};

/// Naive layouts accepted when the raw value has no offset.
/// `%.f` also matches an absent fractional part.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an IANA zone name such as `Europe/Berlin`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| DuebellError::InvalidTimezone(format!("{name}: {e}")))
}

/// Parse a board timestamp into a UTC instant.
///
/// Values with an explicit offset (`Z`, `+02:00`) are converted directly;
/// naive values are interpreted in `default_tz`. For local times that occur
/// twice (DST fall-back) the earlier instant wins.
pub fn parse_instant(raw: &str, default_tz: Tz) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DuebellError::InvalidTimestamp {
            raw: raw.to_string(),
            reason: "empty value".to_string(),
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return default_tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| DuebellError::InvalidTimestamp {
                    raw: raw.to_string(),
                    reason: format!("local time does not exist in {default_tz}"),
                });
        }
    }

    Err(DuebellError::InvalidTimestamp {
        raw: raw.to_string(),
        reason: "unrecognized timestamp layout".to_string(),
    })
}

/// Render a UTC instant in `tz` for human-facing messages.
pub fn format_local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}
