use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Naive layouts accepted when the value carries no offset. Interpreted as UTC.
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse a `createdAt` value to epoch milliseconds.
///
/// Absent or unparseable values degrade to `0` (the epoch), which only ever
/// pushes a message to the front of a thread.
pub fn epoch_millis(created_at: Option<&str>) -> i64 {
    created_at.and_then(parse_millis).unwrap_or(0)
}

fn parse_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    // Date-only values mean midnight UTC.
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
