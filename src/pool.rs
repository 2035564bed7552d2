use crate::error::{ExifToolError, PoolError};
use crate::exiftool::ExifTool;
use log::{debug, info, warn};
use std::path::Path;
use std::time::Duration;

/// A fixed set of exiftool processes, one per worker slot.
///
/// Slots are created eagerly and never reassigned: worker `n` talks to slot `n` for the whole
/// run, so no process is ever shared between two workers.
#[derive(Debug)]
pub struct ExifToolPool {
    slots: Vec<ExifTool>,
}

impl ExifToolPool {
    /// Launches `count` processes of `exiftool_path`.
    pub fn start(
        count: usize,
        exiftool_path: &Path,
        shutdown_grace: Duration,
    ) -> Result<Self, PoolError> {
        Self::start_with(count, |_| {
            Ok(ExifTool::with_executable(exiftool_path)?.with_shutdown_grace(shutdown_grace))
        })
    }

    /// Creates `count` slots with `launch`. If any launch fails, the slots created so far are
    /// closed before the error is returned.
    pub fn start_with<F>(count: usize, mut launch: F) -> Result<Self, PoolError>
    where
        F: FnMut(usize) -> Result<ExifTool, ExifToolError>,
    {
        if count == 0 {
            return Err(PoolError::NoWorkers);
        }

        let mut slots = Vec::with_capacity(count);
        for slot in 0..count {
            match launch(slot) {
                Ok(exiftool) => {
                    debug!("Slot {} bound to exiftool process {}", slot, exiftool.pid());
                    slots.push(exiftool);
                }
                Err(source) => {
                    warn!("Starting slot {} failed, closing {} started slots", slot, slots.len());
                    // Rollback is best effort; the startup failure is what gets reported.
                    let _ = Self { slots }.close_all();
                    return Err(PoolError::Startup { slot, source });
                }
            }
        }

        info!("Started {} exiftool processes", count);
        Ok(Self { slots })
    }

    /// The handle bound to worker `id`.
    pub fn slot_for(&self, id: usize) -> Option<&ExifTool> {
        self.slots.get(id)
    }

    pub fn slots(&self) -> &[ExifTool] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Closes every slot, continuing past failures, and reports the first one.
    pub fn close_all(self) -> Result<(), PoolError> {
        let mut first_error = None;
        for (slot, exiftool) in self.slots.iter().enumerate() {
            match exiftool.close() {
                Ok(shutdown) => debug!("Slot {} closed: {:?}", slot, shutdown),
                Err(source) => {
                    warn!("Failed to close slot {}: {}", slot, source);
                    first_error.get_or_insert(PoolError::Shutdown { slot, source });
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::exiftool::Shutdown;
    use crate::utils::test_helpers::{fake_exiftool, hung_exiftool, sh};
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use std::time::Instant;

    #[test]
    fn test_start_creates_one_process_per_slot() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let script = fake_exiftool(dir.path())?;
        let pool = ExifToolPool::start_with(3, |_| ExifTool::spawn(sh(&script)))?;

        assert_eq!(pool.len(), 3);
        let pids: HashSet<u32> = pool.slots().iter().map(ExifTool::pid).collect();
        assert_eq!(pids.len(), 3);
        assert!(pool.slot_for(2).is_some());
        assert!(pool.slot_for(3).is_none());

        for (id, exiftool) in pool.slots().iter().enumerate() {
            let path = dir.path().join(format!("slot{}.jpg", id));
            let tags = exiftool.read_metadata(&path)?;
            assert_eq!(tags.get("SourceFile"), Some(&path.to_string_lossy().into_owned()));
        }
        pool.close_all()?;
        Ok(())
    }

    #[test]
    fn test_zero_workers() {
        let result = ExifToolPool::start_with(0, |_| ExifTool::new());
        assert_matches!(result, Err(PoolError::NoWorkers));
    }

    #[test]
    fn test_missing_executable() {
        let result = ExifToolPool::start(
            2,
            Path::new("nonexistent_exiftool_command"),
            Duration::from_millis(100),
        );
        assert_matches!(
            result,
            Err(PoolError::Startup { slot: 0, source: ExifToolError::ExifToolNotFound(_) })
        );
    }

    #[test]
    fn test_failed_startup_closes_started_slots() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let script = fake_exiftool(dir.path())?;
        let mut started = Vec::new();

        let result = ExifToolPool::start_with(4, |slot| {
            if slot == 2 {
                return ExifTool::with_executable(Path::new("nonexistent_exiftool_command"));
            }
            let exiftool = ExifTool::spawn(sh(&script))?;
            started.push(exiftool.pid());
            Ok(exiftool)
        });

        assert_matches!(result, Err(PoolError::Startup { slot: 2, .. }));
        assert_eq!(started.len(), 2);
        // signal 0 only probes: the rolled back processes must be gone
        for pid in started {
            let alive = std::process::Command::new("kill")
                .args(["-0", &pid.to_string()])
                .status()?
                .success();
            assert!(!alive, "process {} survived rollback", pid);
        }
        Ok(())
    }

    #[test]
    fn test_close_all_kills_hung_processes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let script = hung_exiftool(dir.path())?;
        let pool = ExifToolPool::start_with(2, |_| {
            Ok(ExifTool::spawn(sh(&script))?.with_shutdown_grace(Duration::from_millis(200)))
        })?;

        let start = Instant::now();
        for exiftool in pool.slots() {
            assert_eq!(exiftool.close()?, Shutdown::Killed);
        }
        pool.close_all()?;
        assert!(start.elapsed() < Duration::from_secs(5));
        Ok(())
    }
}
