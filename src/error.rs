use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to a stay-open `exiftool` process.
#[derive(Debug, Error)]
pub enum ExifToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to launch exiftool: {0}")]
    ExifToolNotFound(std::io::Error),

    #[error("Process terminated unexpectedly.")]
    ProcessTerminated,

    #[error("The exiftool process has already been closed.")]
    Closed,

    #[error("stderr channel for exiftool disconnected.")]
    StderrDisconnected,

    #[error("A previous conversation with exiftool panicked; the response boundary is lost.")]
    ConversationPoisoned,

    #[error("exiftool error: {message}. command={command_args}")]
    ExifToolProcess {
        message: String,
        command_args: String,
    },

    #[error("Expected different format from exiftool. file={path}, args={command_args}")]
    UnexpectedFormat { path: String, command_args: String },
}

/// Failures reading a capture time out of a companion JSON file.
#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Deserialization error at path '{path}': {source}")]
    Deserialization {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid epoch timestamp '{value}': {source}")]
    InvalidEpoch {
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("Epoch timestamp {0} is out of range")]
    OutOfRange(i64),
}

impl From<serde_path_to_error::Error<serde_json::Error>> for CompanionError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        CompanionError::Deserialization {
            path: err.path().to_string(),
            source: err.into_inner(),
        }
    }
}

/// An embedded date string that matched none of the known layouts.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unable to parse date: {0}")]
pub struct DateParseError(pub String);

/// Pool startup or teardown failure.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Failed to start exiftool process {slot}: {source}")]
    Startup { slot: usize, source: ExifToolError },

    #[error("Failed to close exiftool process {slot}: {source}")]
    Shutdown { slot: usize, source: ExifToolError },
}

/// Why a single media file could not be processed. Recorded in its outcome; never aborts a run.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to get EXIF data: {0}")]
    ReadMetadata(ExifToolError),

    #[error("no creation date found in EXIF or sidecar")]
    NoCreationDate,

    #[error("failed to parse sidecar date: {0}")]
    Companion(#[from] CompanionError),

    #[error("failed to update EXIF date: {0}")]
    WriteMetadata(ExifToolError),

    #[error("failed to move file: {0}")]
    Move(std::io::Error),
}

/// Invalid run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source directory is required")]
    MissingSource,

    #[error("output directory is required")]
    MissingOutput,

    #[error("source directory does not exist: {0}")]
    SourceNotFound(PathBuf),

    #[error("failed to create output directory {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },
}
