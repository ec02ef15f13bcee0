//! DateTime utilities backing `Date`-typed properties.
//!
//! Dates are always held as `DateTime<Utc>`. Values arriving from storage
//! or user input are coerced through [`coerce`], which accepts RFC 3339
//! strings, plain dates, naive `YYYY-MM-DD HH:MM:SS` timestamps and
//! millisecond epoch numbers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::value::Value;

/// Parse a textual date in any of the supported layouts.
pub fn parse(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Milliseconds since the Unix epoch.
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Wrap a value in a date. Values that cannot be read as a date are kept as
/// they are so validators can still inspect them.
pub fn coerce(value: Value) -> Value {
    match value {
        Value::Date(_) | Value::Null => value,
        Value::String(ref s) => parse(s).map(Value::Date).unwrap_or(value),
        Value::Int(millis) => from_millis(millis).map(Value::Date).unwrap_or(value),
        Value::Float(millis) => from_millis(millis as i64).map(Value::Date).unwrap_or(value),
        other => other,
    }
}
