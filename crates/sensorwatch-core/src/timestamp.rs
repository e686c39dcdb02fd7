// Timestamp parsing and generation

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

/// Display format used for chart payloads.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Formats seen in sensor exports, tried in order
const FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a timestamp string. Offsets (RFC 3339) are dropped after converting
/// to UTC; a bare date is read as midnight.
pub fn parse(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for format in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// One-minute spaced timestamps for `count` rows, the series starting
/// `count` minutes before `now`.
pub fn generate_series(count: usize, now: NaiveDateTime) -> Vec<NaiveDateTime> {
    let start = now - Duration::minutes(count as i64);
    (0..count)
        .map(|i| start + Duration::minutes(i as i64))
        .collect()
}

pub fn format_display(ts: &NaiveDateTime) -> String {
    ts.format(DISPLAY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, DISPLAY_FORMAT).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        let expected = at("2023-01-01 08:15:00");
        assert_eq!(parse("2023-01-01 08:15:00"), Some(expected));
        assert_eq!(parse("2023-01-01T08:15:00"), Some(expected));
        assert_eq!(parse("2023-01-01T10:15:00+02:00"), Some(expected));
        assert_eq!(parse("2023/01/01 08:15:00"), Some(expected));
        assert_eq!(parse("2023-01-01"), Some(at("2023-01-01 00:00:00")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse("yesterday"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("25.3"), None);
    }

    #[test]
    fn test_generate_series_spacing() {
        let now = at("2024-05-01 12:00:00");
        let series = generate_series(3, now);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0], at("2024-05-01 11:57:00"));
        assert_eq!(series[2], at("2024-05-01 11:59:00"));
    }
}
