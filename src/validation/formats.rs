use regex::Regex;
use std::sync::LazyLock;

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("date pattern"));

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2})(\.\d+)?([zZ]|[+-]\d{2}:?\d{2})$").expect("time pattern")
});

/// Formats that carry no runtime constraint beyond their base type
pub const VOCABULARY_FORMATS: &[&str] = &[
    "byte",
    "double",
    "float",
    "int32",
    "int64",
    "mime-type",
    "uri-template",
];

/// `YYYY-MM-DD` with month 01-12 and day 01-31
pub fn is_valid_date(value: &str) -> bool {
    let Some(captures) = DATE.captures(value) else {
        return false;
    };
    let month: u32 = captures[2].parse().unwrap_or(0);
    let day: u32 = captures[3].parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// A valid date, `T`, a time of day and a timezone marker
pub fn is_valid_date_time(value: &str) -> bool {
    let Some((date, time)) = value.split_once(['T', 't']) else {
        return false;
    };
    if !is_valid_date(date) {
        return false;
    }
    let Some(captures) = TIME.captures(time) else {
        return false;
    };
    let hour: u32 = captures[1].parse().unwrap_or(99);
    let minute: u32 = captures[2].parse().unwrap_or(99);
    let second: u32 = captures[3].parse().unwrap_or(99);
    hour <= 23 && minute <= 59 && second <= 59
}

/// Check a string against a named format; unknown formats pass
pub fn check_format(format: &str, value: &str) -> bool {
    match format {
        "date" => is_valid_date(value),
        "date-time" => is_valid_date_time(value),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dates() {
        assert!(is_valid_date("2024-02-29"));
        assert!(is_valid_date("2024-01-31"));
        assert!(!is_valid_date("2024-13-01"));
        assert!(!is_valid_date("2024-00-10"));
        assert!(!is_valid_date("2024-01-32"));
        assert!(!is_valid_date("2024-1-01"));
        assert!(!is_valid_date("not a date"));
    }

    #[test]
    fn test_date_times() {
        assert!(is_valid_date_time("2024-05-01T23:59:59Z"));
        assert!(is_valid_date_time("2024-05-01t10:15:00.123+02:00"));
        assert!(!is_valid_date_time("2024-05-01T24:00:00Z"));
        assert!(!is_valid_date_time("2024-05-01T10:60:00Z"));
        assert!(!is_valid_date_time("2024-05-01T10:00:60Z"));
        assert!(!is_valid_date_time("2024-05-01T10:00:00"));
        assert!(!is_valid_date_time("2024-05-01"));
    }

    #[test]
    fn test_vocabulary_formats_pass() {
        for format in VOCABULARY_FORMATS {
            assert!(check_format(format, "anything"));
        }
    }
}
