use crate::error::ConfigError;
use crate::exiftool::DEFAULT_SHUTDOWN_GRACE;
use crate::utils::lowercase_extension;
use log::warn;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 4;

/// Date tags in trust order: capture tags before generic creation tags before container tags.
pub const DEFAULT_DATE_TAGS: &[&str] = &[
    "DateTimeOriginal",
    "CreationDate",
    "CreateDate",
    "MediaCreateDate",
    "DateTimeCreated",
];

pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    // images
    ".jpg", ".jpeg", ".png", ".tiff", ".tif", ".bmp", ".gif", ".webp", ".heic", ".heif",
    // videos
    ".mp4", ".mov", ".avi", ".mkv", ".wmv", ".m4v", ".3gp", ".webm", ".flv", ".mts", ".m2ts",
    ".ts", ".mxf",
];

/// Settings for one run. Built once and shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct Config {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Relocate processed files into the date tree under `output_dir`.
    pub organize: bool,
    pub dry_run: bool,
    pub workers: usize,
    pub exiftool: PathBuf,
    pub shutdown_grace: Duration,
    pub date_tags: Vec<String>,
    /// Lowercase, dot-prefixed.
    pub media_extensions: HashSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            organize: false,
            dry_run: false,
            workers: DEFAULT_WORKERS,
            exiftool: PathBuf::from("exiftool"),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            date_tags: DEFAULT_DATE_TAGS.iter().map(|t| t.to_string()).collect(),
            media_extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl Config {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Checks the paths, corrects a zero worker count and creates the output directory
    /// (skipped on a dry run).
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingSource);
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingOutput);
        }
        if !self.source_dir.exists() {
            return Err(ConfigError::SourceNotFound(self.source_dir.clone()));
        }
        if self.workers == 0 {
            warn!("Invalid worker count 0, using {}", DEFAULT_WORKERS);
            self.workers = DEFAULT_WORKERS;
        }
        if !self.dry_run {
            fs::create_dir_all(&self.output_dir).map_err(|source| ConfigError::CreateOutput {
                path: self.output_dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn is_supported_media(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| self.media_extensions.contains(&lowercase_extension(name)))
            .unwrap_or(false)
    }
}
