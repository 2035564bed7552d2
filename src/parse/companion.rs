use crate::error::CompanionError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// The parts of a Takeout companion (`*.supplemental-metadata.json`) this crate reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionData {
    #[serde(default)]
    pub title: Option<String>,
    pub photo_taken_time: EpochTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpochTime {
    /// Unix seconds, string encoded.
    pub timestamp: String,
}

impl EpochTime {
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, CompanionError> {
        let seconds: i64 =
            self.timestamp
                .parse()
                .map_err(|source| CompanionError::InvalidEpoch {
                    value: self.timestamp.clone(),
                    source,
                })?;
        DateTime::from_timestamp(seconds, 0).ok_or(CompanionError::OutOfRange(seconds))
    }
}

/// Parses companion JSON, reporting the failing field path on mismatch.
pub fn parse_companion(content: &str) -> Result<CompanionData, CompanionError> {
    let deserializer = &mut serde_json::Deserializer::from_str(content);
    let data = serde_path_to_error::deserialize(deserializer)?;
    Ok(data)
}

/// Reads a companion file and returns its capture time.
pub fn read_companion_date(path: &Path) -> Result<DateTime<Utc>, CompanionError> {
    let content = fs::read_to_string(path).map_err(|source| CompanionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_companion(&content)?.photo_taken_time.to_datetime()
}

/// Structural check that `content` looks like a companion: a JSON object holding
/// `photoTakenTime.timestamp`. Collection-level files such as an album's `metadata.json` fail it.
pub fn looks_like_companion(content: &str) -> bool {
    serde_json::from_str::<Value>(content)
        .map(|value| {
            value
                .get("photoTakenTime")
                .and_then(|taken| taken.get("timestamp"))
                .is_some()
        })
        .unwrap_or(false)
}

/// [`looks_like_companion`] on a file; unreadable files are not companions.
pub fn is_companion_file(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|content| looks_like_companion(&content))
        .unwrap_or(false)
}
