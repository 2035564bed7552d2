use crate::media::MediaEntry;
use crate::utils::lowercase_extension;
use log::{debug, info};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively collects the regular files under `root` whose lowercased extension is in
/// `extensions`, sorted by path.
pub fn scan_media_files(
    root: &Path,
    extensions: &HashSet<String>,
) -> Result<Vec<MediaEntry>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            debug!("Skipping non UTF-8 name {}", entry.path().display());
            continue;
        };
        if !extensions.contains(&lowercase_extension(name)) {
            continue;
        }
        if let Some(media) = MediaEntry::from_path(entry.into_path()) {
            files.push(media);
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    info!("Found {} media files under {}", files.len(), root.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;

    #[test]
    fn test_scan_media_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let sub = dir.path().join("Photos from 2023");
        fs::create_dir(&sub)?;
        for path in [
            dir.path().join("b.JPG"),
            dir.path().join("a.mp4"),
            dir.path().join("a.mp4.json"),
            dir.path().join("notes.txt"),
            sub.join("IMG_1.heic"),
            sub.join("metadata.json"),
        ] {
            fs::write(path, "test")?;
        }
        fs::create_dir(dir.path().join("folder.jpg"))?;

        let config = Config::default();
        let files = scan_media_files(dir.path(), &config.media_extensions)?;
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["IMG_1.heic", "a.mp4", "b.JPG"]);
        assert_eq!(files[0].dir, sub);
        Ok(())
    }

    #[test]
    fn test_scan_missing_root() {
        let config = Config::default();
        let result = scan_media_files(Path::new("/nonexistent/takeout"), &config.media_extensions);
        assert!(result.is_err());
    }
}
