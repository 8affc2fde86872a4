use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Unix values with a magnitude below this are seconds, at or above it milliseconds.
pub const SECONDS_MAGNITUDE_LIMIT: i64 = 1_000_000_000_000;

/// Server-supplied creation time as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedAt {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CreatedAt {
    /// Sortable epoch milliseconds for this creation time.
    pub fn to_millis(&self) -> Result<i64, CoreError> {
        match self {
            CreatedAt::Integer(value) => Ok(millis_from_unix(*value)),
            CreatedAt::Float(value) => millis_from_unix_float(*value),
            CreatedAt::Text(raw) => parse_created_at(raw),
        }
    }
}

/// Scales a Unix timestamp to milliseconds, treating small magnitudes as seconds.
pub fn millis_from_unix(value: i64) -> i64 {
    if value.unsigned_abs() < SECONDS_MAGNITUDE_LIMIT as u64 {
        value.saturating_mul(1000)
    } else {
        value
    }
}

fn millis_from_unix_float(value: f64) -> Result<i64, CoreError> {
    if !value.is_finite() {
        return Err(CoreError::InvalidTimestamp("non-finite number"));
    }
    let millis = if value.abs() < SECONDS_MAGNITUDE_LIMIT as f64 {
        value * 1000.0
    } else {
        value
    };
    if millis.abs() >= i64::MAX as f64 {
        return Err(CoreError::InvalidTimestamp("number out of range"));
    }
    Ok(millis.round() as i64)
}

/// Parses a textual creation time: RFC 3339 / ISO-8601, a naive
/// `YYYY-MM-DD HH:MM:SS` (read as UTC), or a Unix number in a string.
pub fn parse_created_at(raw: &str) -> Result<i64, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CoreError::InvalidTimestamp("empty value"));
    }
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(millis_from_unix(value));
    }
    if let Ok(value) = raw.parse::<f64>() {
        return millis_from_unix_float(value);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    Err(CoreError::InvalidTimestamp("unrecognized date format"))
}

#[cfg(test)]
mod tests {
    use super::{millis_from_unix, parse_created_at, CreatedAt};
    use crate::error::CoreError;

    const NOV_2023_MS: i64 = 1_700_000_000_000;

    #[test]
    fn unix_seconds_and_millis_are_disambiguated_by_magnitude() {
        assert_eq!(millis_from_unix(1_700_000_000), NOV_2023_MS);
        assert_eq!(millis_from_unix(NOV_2023_MS), NOV_2023_MS);
        assert_eq!(millis_from_unix(999_999_999_999), 999_999_999_999_000);
        assert_eq!(millis_from_unix(1_000_000_000_000), 1_000_000_000_000);
    }

    #[test]
    fn rfc3339_with_offset_and_fraction_parses() {
        assert_eq!(parse_created_at("2023-11-14T22:13:20Z"), Ok(NOV_2023_MS));
        assert_eq!(
            parse_created_at("2023-11-15T06:13:20.250+08:00"),
            Ok(NOV_2023_MS + 250)
        );
    }

    #[test]
    fn naive_datetime_is_read_as_utc() {
        assert_eq!(parse_created_at("2023-11-14 22:13:20"), Ok(NOV_2023_MS));
        assert_eq!(parse_created_at("2023-11-14T22:13:20.5"), Ok(NOV_2023_MS + 500));
    }

    #[test]
    fn numeric_strings_use_unix_rules() {
        assert_eq!(parse_created_at(" 1700000000 "), Ok(NOV_2023_MS));
        assert_eq!(parse_created_at("1700000000000"), Ok(NOV_2023_MS));
        assert_eq!(parse_created_at("1700000000.5"), Ok(NOV_2023_MS + 500));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(
            parse_created_at(""),
            Err(CoreError::InvalidTimestamp("empty value"))
        );
        assert_eq!(
            parse_created_at("yesterday"),
            Err(CoreError::InvalidTimestamp("unrecognized date format"))
        );
        assert!(CreatedAt::Float(f64::NAN).to_millis().is_err());
    }

    #[test]
    fn wire_forms_deserialize_into_the_right_variant() {
        let int: CreatedAt = serde_json::from_str("1700000000").expect("integer");
        let float: CreatedAt = serde_json::from_str("1700000000.25").expect("float");
        let text: CreatedAt = serde_json::from_str("\"2023-11-14T22:13:20Z\"").expect("text");
        assert_eq!(int, CreatedAt::Integer(1_700_000_000));
        assert_eq!(int.to_millis(), Ok(NOV_2023_MS));
        assert_eq!(float.to_millis(), Ok(NOV_2023_MS + 250));
        assert_eq!(text.to_millis(), Ok(NOV_2023_MS));
    }
}
