//! Literal instants accepted inside `when` expressions.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::time::{Duration, SystemTime};

/// Naive layouts, interpreted as UTC. `%.f` also accepts a missing fraction.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Layouts carrying an explicit offset but not strictly RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse a literal into an instant.
///
/// Accepts RFC 3339, naive date-times (`T` or space separated, optional
/// fractional seconds, read as UTC) and bare dates (midnight UTC).
pub fn parse_instant(literal: &str) -> Option<SystemTime> {
    let s = literal.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).into());
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc).into());
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive).into());
        }
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?).into())
}

/// Canonical rendering used by `Display` implementations (RFC 3339, UTC).
///
/// Instants outside the calendar range are rendered as a signed offset from
/// the epoch, e.g. `epoch+4611686018427387904s`; such text does not parse back.
pub fn format_instant(instant: SystemTime) -> String {
    let (after_epoch, offset) = match instant.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(offset) => (true, offset),
        Err(e) => (false, e.duration()),
    };
    match to_datetime(after_epoch, offset) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => {
            let sign = if after_epoch { '+' } else { '-' };
            match offset.subsec_nanos() {
                0 => format!("epoch{}{}s", sign, offset.as_secs()),
                nanos => format!("epoch{}{}.{:09}s", sign, offset.as_secs(), nanos),
            }
        }
    }
}

fn to_datetime(after_epoch: bool, offset: Duration) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(offset.as_secs()).ok()?;
    let nanos = offset.subsec_nanos();
    if after_epoch {
        DateTime::from_timestamp(secs, nanos)
    } else if nanos == 0 {
        DateTime::from_timestamp(-secs, 0)
    } else {
        DateTime::from_timestamp(-secs - 1, 1_000_000_000 - nanos)
    }
}
