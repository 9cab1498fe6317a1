use chrono::{DateTime, Utc};
use serde_json::Value;

/// Parse a posting date sent either as an RFC 3339 string or as unix milliseconds
pub fn parse_posted_at(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Format a posting date for a list row (e.g., "Mar 04, 2024")
pub fn format_posted_date(value: Option<&Value>) -> String {
    value
        .and_then(parse_posted_at)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_default()
}
