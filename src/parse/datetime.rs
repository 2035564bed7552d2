use crate::error::DateParseError;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use std::collections::HashMap;

/// Layouts carrying a UTC offset.
const ZONED_LAYOUTS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S%.f%:z",
    "%Y:%m:%d %H:%M:%S%:z",
    // Windows-style offset (e.g., +0300)
    "%Y:%m:%d %H:%M:%S%.f%#z",
    "%Y:%m:%d %H:%M:%S%#z",
];

/// Offset-less layouts, read as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y:%m:%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parses one exiftool date value.
///
/// Accepts the exif layout (`2023:01:01 12:30:45`, optionally with subseconds and offset),
/// RFC 3339 (`2023-01-01T12:30:45Z`, `2023-01-01T12:30:45-07:00`) and the dashed
/// `2023-01-01 12:30:45`. Values without an offset are taken as UTC.
pub fn parse_exif_date(value: &str) -> Result<DateTime<Utc>, DateParseError> {
    let value = value.trim();

    if let Ok(zoned) = DateTime::parse_from_rfc3339(value) {
        return Ok(zoned.with_timezone(&Utc));
    }
    for layout in ZONED_LAYOUTS {
        if let Ok(zoned) = DateTime::parse_from_str(value, layout) {
            return Ok(zoned.with_timezone(&Utc));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, layout) {
            return Ok(naive.and_utc());
        }
    }

    Err(DateParseError(value.to_string()))
}

/// Picks the capture time from a file's tags.
///
/// `priority` is walked in order and the first tag holding a parseable value wins; tags that are
/// missing, empty or unparseable (exiftool renders unset dates as `0000:00:00 00:00:00`) are
/// skipped.
pub fn date_from_tags<S: AsRef<str>>(
    tags: &HashMap<String, String>,
    priority: &[S],
) -> Option<DateTime<Utc>> {
    priority.iter().find_map(|tag| {
        let tag = tag.as_ref();
        let value = tags.get(tag).filter(|v| !v.is_empty())?;
        match parse_exif_date(value) {
            Ok(date) => Some(date),
            Err(e) => {
                debug!("Skipping tag {}: {}", tag, e);
                None
            }
        }
    })
}
