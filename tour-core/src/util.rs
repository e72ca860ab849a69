//! Small helpers shared by the document types: ids, durations and dates

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

/// A fresh globally-unique id in the hyphenated form tour files use
pub fn new_guid() -> String {
    Uuid::new_v4().to_string()
}

/// Formats milliseconds as `HH:MM:SS.fff`
pub fn format_duration(duration_ms: u64) -> String {
    let hours = duration_ms / 3_600_000;
    let minutes = (duration_ms / 60_000) % 60;
    let seconds = (duration_ms / 1000) % 60;
    let millis = duration_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// Parses `h:m:s` where seconds may be fractional. Returns `None` unless
/// there are exactly three colon-separated fields.
pub fn parse_duration(value: &str) -> Option<u64> {
    let fields: Vec<&str> = value.trim().split(':').collect();
    let [h, m, s] = fields.as_slice() else {
        return None;
    };
    let hours: f64 = h.trim().parse().ok()?;
    let minutes: f64 = m.trim().parse().ok()?;
    let seconds: f64 = s.trim().parse().ok()?;
    let total = hours * 3_600_000.0 + minutes * 60_000.0 + seconds * 1000.0;
    if !total.is_finite() || total < 0.0 {
        return None;
    }
    Some(total.round() as u64)
}

/// Dates are written as RFC 3339
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339()
}

/// Reads RFC 3339, or the `MM/DD/YYYY HH:MM:SS [AM|PM]` form older
/// tours were saved with.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(value) {
        return Some(d.with_timezone(&Utc));
    }
    ["%m/%d/%Y %I:%M:%S %p", "%m/%d/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
