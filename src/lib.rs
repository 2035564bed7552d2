//! # takeout-fix
//!
//! Repairs the capture dates of a Google Photos Takeout export.
//!
//! Takeout keeps the authoritative capture time of many files in a companion JSON file next to
//! the media instead of in the media's own metadata, and names those companions inconsistently.
//! This crate finds each file's companion, reads its `photoTakenTime`, and writes it back into
//! the file through a pool of stay-open ExifTool processes, one per worker.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use takeout_fix::{process_files, scan_media_files, Config, ExifToolPool, Summary};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::new("Takeout/Google Photos", "fixed");
//!     config.validate()?;
//!
//!     let files = scan_media_files(&config.source_dir, &config.media_extensions)?;
//!     let pool = ExifToolPool::start(config.workers, &config.exiftool, config.shutdown_grace)?;
//!     let outcomes = process_files(&config, pool.slots(), files)?;
//!     pool.close_all()?;
//!
//!     println!("{}", Summary::from_outcomes(&outcomes));
//!     Ok(())
//! }
//! ```
//!
//! Companion lookup on its own:
//!
//! ```no_run
//! use std::path::Path;
//! use takeout_fix::CompanionMatcher;
//!
//! let matcher = CompanionMatcher::default();
//! if let Some(companion) = matcher.resolve_in_dir(Path::new("Photos from 2023/IMG_456(1).jpg"))? {
//!     // e.g. Photos from 2023/IMG_456.jpg.supplemental-metadata(1).json
//!     println!("{}", companion.display());
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod companion;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exiftool;
pub mod media;
pub mod organize;
pub mod parse;
pub mod pool;
pub mod scan;
pub mod summary;
mod utils;

pub use companion::{CompanionMatcher, DirListing};
pub use config::Config;
pub use dispatch::{process_files, process_media_file};
pub use error::{
    CompanionError, ConfigError, DateParseError, ExifToolError, PoolError, ProcessError,
};
pub use exiftool::{ExifTool, MetadataTool, Shutdown};
pub use media::{MediaEntry, Outcome, ResolvedTimestamp, TimestampSource};
pub use pool::ExifToolPool;
pub use scan::scan_media_files;
pub use summary::Summary;
