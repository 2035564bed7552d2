//! Capture-time extraction, from exiftool tag values and from companion JSON files.

pub mod companion;
pub mod datetime;

pub use companion::{is_companion_file, read_companion_date, CompanionData};
pub use datetime::{date_from_tags, parse_exif_date};
