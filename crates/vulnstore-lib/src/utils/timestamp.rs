// Timestamp formatting shared by the store

use chrono::{DateTime, SecondsFormat, Utc};

/// Format an instant for storage
/// Fixed microsecond precision keeps stored values lexically ordered
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Format an instant reported by a source, keeping its full precision
pub fn format_reported(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Current time in storage format
pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(&whole), "2025-01-02T03:04:05.000000Z");
        assert_eq!(now_timestamp().len(), format_timestamp(&whole).len());
    }

    #[test]
    fn test_reported_keeps_nanoseconds() {
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(format_reported(&precise), "2023-11-14T22:13:20.123456789Z");
    }
}
