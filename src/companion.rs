//! Pairing media files with their Takeout companion JSON.
//!
//! Takeout names the companion of `IMG_1.jpg` `IMG_1.jpg.supplemental-metadata.json`, but it
//! truncates long names at an arbitrary character, moves a `(N)` duplicate counter behind the
//! token, drops trailing underscores and shares one companion between an original and its
//! `-edited` copy. Resolution reads the media name in every plausible way ([`MediaName`]) and
//! tries two strategies in order: exact patterns over all readings first, then progressively
//! shorter prefixes. A candidate is only accepted once its content looks like a companion.

use crate::parse::companion::is_companion_file;
use crate::utils::split_extension;
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The token Takeout inserts between media name and `.json`, cut short when the name is long.
pub const COMPANION_TOKEN: &str = "supplemental-metadata";
/// Marker Google Photos appends to the stem of edited copies.
pub const EDITED_MARKER: &str = "-edited";
/// Shortest prefix the progressive fallback will try.
pub const MIN_PREFIX_CHARS: usize = 10;

const JSON_EXT: &str = ".json";

/// Names of the non-directory entries of one directory, sorted so matching is deterministic.
#[derive(Debug, Clone, Default)]
pub struct DirListing {
    dir: PathBuf,
    names: Vec<String>,
}

impl DirListing {
    pub fn read(dir: &Path) -> io::Result<Self> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            // Non UTF-8 names can't be matched textually.
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(Self::from_names(dir, names))
    }

    pub fn from_names<I, S>(dir: impl Into<PathBuf>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        Self {
            dir: dir.into(),
            names,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `(full name, name without .json)` of every JSON entry.
    fn json_entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.names
            .iter()
            .filter_map(|name| name.strip_suffix(JSON_EXT).map(|body| (name.as_str(), body)))
    }
}

/// Strategy that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ExactPattern,
    ProgressivePrefix,
}

/// One reading of a media file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MediaName<'a> {
    stem: &'a str,
    /// Extension including the dot, or empty.
    ext: &'a str,
    /// Duplicate counter such as `(1)`, or empty.
    suffix: &'a str,
}

impl<'a> MediaName<'a> {
    /// All readings of `file_name`, most specific first: the numbered reading when the stem ends
    /// in `(N)`, then the literal one, then both again with the edited marker removed.
    fn readings(file_name: &'a str) -> Vec<MediaName<'a>> {
        let (stem, ext) = split_extension(file_name);
        let mut readings = Vec::with_capacity(4);
        if let Some((base, suffix)) = split_numbered(stem) {
            readings.push(MediaName { stem: base, ext, suffix });
        }
        readings.push(MediaName { stem, ext, suffix: "" });

        let edited: Vec<MediaName<'a>> = readings
            .iter()
            .filter_map(|reading| {
                reading
                    .stem
                    .strip_suffix(EDITED_MARKER)
                    .filter(|s| !s.is_empty())
                    .map(|stem| MediaName { stem, ..*reading })
            })
            .collect();
        readings.extend(edited);
        readings
    }

    fn exact_patterns(&self) -> Vec<ExactPattern<'a>> {
        let mut patterns = vec![ExactPattern::Tagged {
            base: format!("{}{}", self.stem, self.ext),
            suffix: self.suffix,
        }];
        // Takeout sometimes drops one trailing underscore from the stem.
        if let Some(trimmed) = self.stem.strip_suffix('_').filter(|s| !s.is_empty()) {
            patterns.push(ExactPattern::Tagged {
                base: format!("{}{}", trimmed, self.ext),
                suffix: self.suffix,
            });
            patterns.push(ExactPattern::Bare {
                stem: trimmed,
                suffix: self.suffix,
            });
        }
        patterns
    }
}

/// Splits `name(12)` into `("name", "(12)")`. Only a trailing, digits-only group counts.
fn split_numbered(stem: &str) -> Option<(&str, &str)> {
    let open = stem.strip_suffix(')')?.rfind('(')?;
    let digits = &stem[open + 1..stem.len() - 1];
    if open == 0 || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(stem.split_at(open))
}

fn numbered_suffix(stem: &str) -> &str {
    split_numbered(stem).map_or("", |(_, suffix)| suffix)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExactPattern<'a> {
    /// `<base>[.<prefix of COMPANION_TOKEN>]<suffix>.json`
    Tagged { base: String, suffix: &'a str },
    /// `<stem><suffix>.json`, extension dropped.
    Bare { stem: &'a str, suffix: &'a str },
}

impl ExactPattern<'_> {
    fn matches(&self, body: &str) -> bool {
        match self {
            ExactPattern::Tagged { base, suffix } => {
                let Some(rest) = body
                    .strip_suffix(suffix)
                    .and_then(|b| b.strip_prefix(base.as_str()))
                else {
                    return false;
                };
                rest.is_empty()
                    || rest.strip_prefix('.').is_some_and(|token| {
                        !token.is_empty() && COMPANION_TOKEN.starts_with(token)
                    })
            }
            ExactPattern::Bare { stem, suffix } => body.strip_suffix(suffix) == Some(*stem),
        }
    }
}

/// Resolves the companion JSON of a media file from its directory listing.
#[derive(Debug, Clone)]
pub struct CompanionMatcher {
    min_prefix_chars: usize,
}

impl Default for CompanionMatcher {
    fn default() -> Self {
        Self {
            min_prefix_chars: MIN_PREFIX_CHARS,
        }
    }
}

impl CompanionMatcher {
    pub fn with_min_prefix_chars(min_prefix_chars: usize) -> Self {
        Self {
            min_prefix_chars: min_prefix_chars.max(1),
        }
    }

    /// Finds the companion of `file_name` among `listing`, validating content on disk.
    pub fn resolve(&self, file_name: &str, listing: &DirListing) -> Option<PathBuf> {
        self.resolve_with(file_name, listing, is_companion_file)
            .map(|(path, _)| path)
    }

    /// Reads the media file's directory and resolves its companion.
    pub fn resolve_in_dir(&self, path: &Path) -> io::Result<Option<PathBuf>> {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let listing = DirListing::read(dir)?;
        Ok(self.resolve(file_name, &listing))
    }

    /// [`resolve`](Self::resolve) with a custom content check, also reporting which strategy
    /// matched.
    pub fn resolve_with<F>(
        &self,
        file_name: &str,
        listing: &DirListing,
        is_companion: F,
    ) -> Option<(PathBuf, Strategy)>
    where
        F: Fn(&Path) -> bool,
    {
        let readings = MediaName::readings(file_name);
        let accept = |name: &str| {
            let path = listing.dir().join(name);
            is_companion(&path).then_some(path)
        };

        let found = readings
            .iter()
            .find_map(|reading| self.exact_match(reading, listing, &accept))
            .map(|path| (path, Strategy::ExactPattern))
            .or_else(|| {
                readings
                    .iter()
                    .find_map(|reading| self.prefix_match(reading, listing, &accept))
                    .map(|path| (path, Strategy::ProgressivePrefix))
            });

        match &found {
            Some((path, strategy)) => {
                debug!("{} -> {} ({:?})", file_name, path.display(), strategy)
            }
            None => debug!("No companion for {} in {}", file_name, listing.dir().display()),
        }
        found
    }

    fn exact_match<F>(
        &self,
        reading: &MediaName<'_>,
        listing: &DirListing,
        accept: &F,
    ) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        reading.exact_patterns().iter().find_map(|pattern| {
            listing
                .json_entries()
                .filter(|(_, body)| pattern.matches(body))
                .find_map(|(name, _)| accept(name))
        })
    }

    /// Treats a miss as truncation at an arbitrary character: tries the stem and every shorter
    /// prefix down to the floor, taking the first entry that starts with it, carries the same
    /// duplicate counter and whose own stem is within a third of the media stem's length.
    fn prefix_match<F>(
        &self,
        reading: &MediaName<'_>,
        listing: &DirListing,
        accept: &F,
    ) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let stem = reading.stem;
        // boundaries[k] is the byte length of the first k chars
        let boundaries: Vec<usize> = stem
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(stem.len()))
            .collect();
        let stem_chars = boundaries.len() - 1;
        if stem_chars == 0 {
            return None;
        }
        let floor = self.min_prefix_chars.min(stem_chars);
        let max_diff = stem_chars / 3;
        let stem_counter = numbered_suffix(stem);

        let eligible = |body: &str| {
            let own_stem = if reading.suffix.is_empty() {
                // a numbered companion belongs to a numbered media file
                if numbered_suffix(body) != stem_counter {
                    return false;
                }
                body
            } else {
                match body.strip_suffix(reading.suffix) {
                    Some(own) => own,
                    None => return false,
                }
            };
            own_stem.chars().count().abs_diff(stem_chars) <= max_diff
        };

        // A name that fails content validation fails it at every shorter prefix too.
        let mut rejected: HashSet<&str> = HashSet::new();
        for chars in (floor..=stem_chars).rev() {
            let prefix = &stem[..boundaries[chars]];
            for (name, body) in listing.json_entries() {
                if !body.starts_with(prefix) || rejected.contains(name) || !eligible(body) {
                    continue;
                }
                match accept(name) {
                    Some(path) => return Some(path),
                    None => {
                        rejected.insert(name);
                    }
                }
            }
        }
        None
    }
}
