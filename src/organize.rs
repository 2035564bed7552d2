//! Relocation of processed files into a date tree, with album symlinks.
//!
//! ```text
//! <output>/ALL_PHOTOS/2023/01/01/IMG_1.jpg
//! <output>/ALBUMS/Holiday/IMG_1.jpg -> ../../ALL_PHOTOS/2023/01/01/IMG_1.jpg
//! ```

use crate::config::Config;
use crate::error::ProcessError;
use crate::media::{MediaEntry, ResolvedTimestamp};
use chrono::Datelike;
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

pub const ALL_PHOTOS_DIR: &str = "ALL_PHOTOS";
pub const ALBUMS_DIR: &str = "ALBUMS";
/// Album description Takeout places in every album directory.
pub const ALBUM_METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Deserialize)]
struct AlbumMetadata {
    #[serde(default)]
    title: String,
}

pub fn destination_path(output_dir: &Path, file_name: &str, date: &impl Datelike) -> PathBuf {
    output_dir
        .join(ALL_PHOTOS_DIR)
        .join(format!("{:04}", date.year()))
        .join(format!("{:02}", date.month()))
        .join(format!("{:02}", date.day()))
        .join(file_name)
}

/// Separators in the title are replaced so every album is one directory deep.
pub fn album_symlink_path(output_dir: &Path, album: &str, file_name: &str) -> PathBuf {
    let album = album.replace(['/', '\\'], "_");
    output_dir.join(ALBUMS_DIR).join(album).join(file_name)
}

/// Title of the album `dir` belongs to, if it has album metadata with a non-empty title.
pub fn read_album_title(dir: &Path) -> Option<String> {
    let content = fs::read_to_string(dir.join(ALBUM_METADATA_FILE)).ok()?;
    match serde_json::from_str::<AlbumMetadata>(&content) {
        Ok(metadata) => Some(metadata.title.trim().to_string()).filter(|t| !t.is_empty()),
        Err(e) => {
            debug!("Ignoring album metadata in {}: {}", dir.display(), e);
            None
        }
    }
}

/// Renames `src` to `dest`, creating parent directories. An existing `dest` is never replaced.
pub fn move_file(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if dest.symlink_metadata().is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        ));
    }
    fs::rename(src, dest)
}

/// `target` expressed relative to the directory `base`.
fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let target: Vec<Component> = target.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

/// Points `link` at `target` with a relative link, replacing whatever link is already there.
pub fn create_album_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let album_dir = link
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "symlink has no parent"))?;
    fs::create_dir_all(album_dir)?;
    let relative = relative_path(target, album_dir);

    if link.symlink_metadata().is_ok() {
        fs::remove_file(link)?;
    }
    symlink(&relative, link)
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(original, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_original: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

/// Moves `entry` into the date tree and links it from its album. Returns the action texts.
///
/// A failed move fails the file; a failed album link is only reported in the actions. On a dry
/// run nothing is touched and the actions say what would happen.
pub fn organize(
    config: &Config,
    entry: &MediaEntry,
    timestamp: &ResolvedTimestamp,
) -> Result<Vec<String>, ProcessError> {
    let date = timestamp.wall_clock();
    let dest = destination_path(&config.output_dir, &entry.file_name, &date);
    let mut actions = Vec::with_capacity(2);

    if config.dry_run {
        actions.push(format!("Would move to: {}", dest.display()));
    } else {
        move_file(&entry.path, &dest).map_err(ProcessError::Move)?;
        actions.push(format!("Moved to: {}", dest.display()));
    }

    if let Some(album) = read_album_title(&entry.dir) {
        let link = album_symlink_path(&config.output_dir, &album, &entry.file_name);
        if config.dry_run {
            actions.push(format!("Would create album symlink: {}", link.display()));
        } else {
            match create_album_symlink(&dest, &link) {
                Ok(()) => actions.push(format!("Album symlink created: {}", link.display())),
                Err(e) => {
                    warn!("Album symlink {} failed: {}", link.display(), e);
                    actions.push(format!("Symlink error: {}", e));
                }
            }
        }
    }
    Ok(actions)
}
