use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Formats `time` as an IMF-fixdate, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`.
pub fn fmt_http_date(time: SystemTime) -> String {
    let datetime = DateTime::<Utc>::from(time);
    datetime.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parses an HTTP date. Returns `None` for anything chrono's RFC 2822
/// parser rejects or for dates before the epoch.
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    let datetime = DateTime::parse_from_rfc2822(value.trim()).ok()?;
    let secs = u64::try_from(datetime.timestamp()).ok()?;
    Some(UNIX_EPOCH + Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_http_date() {
        let time = UNIX_EPOCH + Duration::from_secs(1_445_412_480);
        assert_eq!(fmt_http_date(time), "Wed, 21 Oct 2015 07:28:00 GMT");
    }

    #[test]
    fn test_fmt_truncates_subseconds() {
        let time = UNIX_EPOCH + Duration::from_millis(1_445_412_480_999);
        assert_eq!(fmt_http_date(time), "Wed, 21 Oct 2015 07:28:00 GMT");
    }

    #[test]
    fn test_parse_http_date() {
        let parsed = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parsed, Some(UNIX_EPOCH + Duration::from_secs(1_445_412_480)));
    }

    #[test]
    fn test_parse_roundtrip() {
        let time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(parse_http_date(&fmt_http_date(time)), Some(time));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_http_date("yesterday"), None);
        assert_eq!(parse_http_date(""), None);
    }
}
