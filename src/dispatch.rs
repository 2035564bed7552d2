//! Fans media files out over a fixed set of workers, one metadata tool each.

use crate::companion::{CompanionMatcher, DirListing};
use crate::config::Config;
use crate::error::{PoolError, ProcessError};
use crate::exiftool::{MetadataTool, DATE_FORMAT};
use crate::media::{MediaEntry, Outcome, ResolvedTimestamp};
use crate::organize::organize;
use crate::parse::{date_from_tags, read_companion_date};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use std::thread;

pub const ACTION_NONE: &str = "No action needed";
pub const ACTION_UPDATED: &str = "Updated EXIF from sidecar";
const ACTION_SEPARATOR: &str = " | ";
const PROGRESS_INTERVAL: usize = 10;

/// A worker and the tool it owns for the whole run.
#[derive(Debug)]
pub struct WorkerSlot<'a, T> {
    pub id: usize,
    pub tool: &'a T,
}

impl<T: MetadataTool> WorkerSlot<'_, T> {
    fn run(
        &self,
        config: &Config,
        matcher: &CompanionMatcher,
        jobs: Receiver<MediaEntry>,
        outcomes: Sender<Outcome>,
    ) {
        let mut handled = 0usize;
        for entry in jobs {
            let outcome = process_media_file(config, self.tool, matcher, entry);
            handled += 1;
            if outcomes.send(outcome).is_err() {
                warn!("Worker {}: outcome sink closed", self.id);
                break;
            }
        }
        debug!("Worker {} finished after {} files", self.id, handled);
    }
}

/// Processes `files` with one worker per tool and returns one outcome per file, in completion
/// order.
///
/// Worker `n` only ever talks to `tools[n]`. Files are handed out through a bounded queue and
/// per-file failures are logged as they arrive.
pub fn process_files<T: MetadataTool>(
    config: &Config,
    tools: &[T],
    files: Vec<MediaEntry>,
) -> Result<Vec<Outcome>, PoolError> {
    if tools.is_empty() {
        return Err(PoolError::NoWorkers);
    }
    let total = files.len();
    let matcher = CompanionMatcher::default();
    let (job_sender, job_receiver) = bounded::<MediaEntry>(tools.len() * 2);
    let (outcome_sender, outcome_receiver) = unbounded::<Outcome>();

    info!("Processing {} files with {} workers", total, tools.len());
    let outcomes = thread::scope(|scope| {
        for (id, tool) in tools.iter().enumerate() {
            let slot = WorkerSlot { id, tool };
            let jobs = job_receiver.clone();
            let outcomes = outcome_sender.clone();
            let matcher = &matcher;
            scope.spawn(move || slot.run(config, matcher, jobs, outcomes));
        }
        // The workers hold the remaining handles; the sink closes when the last one exits.
        drop(job_receiver);
        drop(outcome_sender);

        scope.spawn(move || {
            for entry in files {
                if job_sender.send(entry).is_err() {
                    break;
                }
            }
        });

        collect_outcomes(outcome_receiver, total)
    });
    info!("Processing complete");
    Ok(outcomes)
}

fn collect_outcomes(receiver: Receiver<Outcome>, total: usize) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(total);
    for outcome in receiver {
        if let Some(e) = &outcome.error {
            error!("{} - {}", outcome.entry.path.display(), e);
        }
        outcomes.push(outcome);
        let processed = outcomes.len();
        if processed % PROGRESS_INTERVAL == 0 || processed == total {
            info!("Processed: {}/{} files", processed, total);
        }
    }
    outcomes
}

/// Runs the whole pipeline for one file: embedded date, else companion date written back,
/// then optional relocation.
pub fn process_media_file<T: MetadataTool + ?Sized>(
    config: &Config,
    tool: &T,
    matcher: &CompanionMatcher,
    entry: MediaEntry,
) -> Outcome {
    match fix_timestamp(config, tool, matcher, &entry) {
        Ok((action, timestamp)) => Outcome::success(entry, action, timestamp),
        Err(e) => Outcome::failure(entry, e),
    }
}

fn fix_timestamp<T: MetadataTool + ?Sized>(
    config: &Config,
    tool: &T,
    matcher: &CompanionMatcher,
    entry: &MediaEntry,
) -> Result<(String, ResolvedTimestamp), ProcessError> {
    let tags = tool
        .read_metadata(&entry.path)
        .map_err(ProcessError::ReadMetadata)?;

    let mut actions = Vec::new();
    let timestamp = match date_from_tags(&tags, &config.date_tags) {
        Some(instant) => ResolvedTimestamp::embedded(instant),
        None => {
            let timestamp = ResolvedTimestamp::companion(companion_date(matcher, entry)?);
            if !config.dry_run {
                let date = timestamp.wall_clock().format(DATE_FORMAT).to_string();
                tool.write_all_dates(&entry.path, &date)
                    .map_err(ProcessError::WriteMetadata)?;
            }
            actions.push(ACTION_UPDATED.to_string());
            timestamp
        }
    };

    if config.organize {
        actions.extend(organize(config, entry, &timestamp)?);
    }

    let action = if actions.is_empty() {
        ACTION_NONE.to_string()
    } else {
        actions.join(ACTION_SEPARATOR)
    };
    Ok((action, timestamp))
}

fn companion_date(
    matcher: &CompanionMatcher,
    entry: &MediaEntry,
) -> Result<chrono::DateTime<chrono::Utc>, ProcessError> {
    let listing = match DirListing::read(&entry.dir) {
        Ok(listing) => listing,
        Err(e) => {
            warn!("Cannot list {}: {}", entry.dir.display(), e);
            return Err(ProcessError::NoCreationDate);
        }
    };
    let companion = matcher
        .resolve(&entry.file_name, &listing)
        .ok_or(ProcessError::NoCreationDate)?;
    Ok(read_companion_date(&companion)?)
}
