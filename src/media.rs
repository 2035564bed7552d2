use crate::error::ProcessError;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};

/// A discovered media file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub dir: PathBuf,
}

impl MediaEntry {
    /// `None` when the path has no UTF-8 file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_str()?.to_string();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        Some(Self {
            path,
            file_name,
            dir,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    Embedded,
    Companion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimestamp {
    pub instant: DateTime<Utc>,
    pub source: TimestampSource,
}

impl ResolvedTimestamp {
    pub fn embedded(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            source: TimestampSource::Embedded,
        }
    }

    pub fn companion(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            source: TimestampSource::Companion,
        }
    }

    /// The wall-clock time to write back and to file by: embedded dates as they were read,
    /// companion epochs in the local zone.
    pub fn wall_clock(&self) -> NaiveDateTime {
        match self.source {
            TimestampSource::Embedded => self.instant.naive_utc(),
            TimestampSource::Companion => self.instant.with_timezone(&Local).naive_local(),
        }
    }
}

/// Result of processing one media file.
#[derive(Debug)]
pub struct Outcome {
    pub entry: MediaEntry,
    pub action: String,
    pub error: Option<ProcessError>,
    pub timestamp: Option<ResolvedTimestamp>,
}

impl Outcome {
    pub fn success(
        entry: MediaEntry,
        action: impl Into<String>,
        timestamp: ResolvedTimestamp,
    ) -> Self {
        Self {
            entry,
            action: action.into(),
            error: None,
            timestamp: Some(timestamp),
        }
    }

    pub fn failure(entry: MediaEntry, error: ProcessError) -> Self {
        Self {
            entry,
            action: String::new(),
            error: Some(error),
            timestamp: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
