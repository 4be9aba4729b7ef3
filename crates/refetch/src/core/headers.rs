//! Header values the engine reads and writes.

use crate::core::codec::MAX_SAFE_INTEGER;
use crate::error::{Error, Result};

pub const CONTENT_LENGTH: &str = "Content-Length";
pub const LAST_MODIFIED: &str = "Last-Modified";
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";
pub const IF_RANGE: &str = "If-Range";
pub const RANGE: &str = "Range";

/// Parses `Content-Length`. A missing header means unknown length (`0`).
pub fn parse_content_length(value: Option<&str>) -> Result<u64> {
    let Some(value) = value else {
        return Ok(0);
    };

    match value.trim().parse::<u64>() {
        Ok(len) if len <= MAX_SAFE_INTEGER => Ok(len),
        _ => Err(Error::InvalidContentLength(value.to_string())),
    }
}

/// `Range` value requesting everything from `begin` to the end.
pub fn range_from(begin: u64) -> String { format!("bytes={begin}-") }

/// Compares received payload bytes against the declared length.
///
/// An unknown declared length (`0`) accepts anything.
pub fn check_length(declared: u64, written: u64) -> Result<()> {
    if declared == 0 || declared == written {
        Ok(())
    } else {
        Err(Error::LengthMismatch {
            expected: declared,
            received: written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_length() {
        assert_eq!(parse_content_length(Some("5")).unwrap(), 5);
        assert_eq!(parse_content_length(Some(" 42 ")).unwrap(), 42);
        assert_eq!(parse_content_length(None).unwrap(), 0);
    }

    #[test]
    fn test_parse_content_length_invalid() {
        for value in ["", "-1", "1.5", "abc", "9007199254740992"] {
            assert!(
                matches!(parse_content_length(Some(value)), Err(Error::InvalidContentLength(_))),
                "{value}"
            );
        }
    }

    #[test]
    fn test_range_from() {
        assert_eq!(range_from(0), "bytes=0-");
        assert_eq!(range_from(400), "bytes=400-");
    }

    #[test]
    fn test_check_length() {
        assert!(check_length(0, 123).is_ok());
        assert!(check_length(5, 5).is_ok());
        assert!(matches!(
            check_length(10, 4),
            Err(Error::LengthMismatch { expected: 10, received: 4 })
        ));
    }
}
