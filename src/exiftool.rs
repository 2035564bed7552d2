use crate::error::ExifToolError;
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

/// Line exiftool prints on stdout once a command has been fully answered.
const READY_MARKER: &str = "{ready}";
const STDERR_POLL_INTERVAL: Duration = Duration::from_millis(2);
const STDERR_POLL_TIMEOUT: Duration = Duration::from_millis(10);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Layout exiftool is asked to render dates in, and the layout corrected dates are written in.
pub const DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The two metadata operations a worker needs from its tool.
///
/// Implemented by [`ExifTool`]; the dispatcher is generic over it so workers can be driven by
/// anything that keeps one conversation per slot.
pub trait MetadataTool: Sync {
    /// Returns the string-valued tags of `path`. No output means an empty map.
    fn read_metadata(&self, path: &Path) -> Result<HashMap<String, String>, ExifToolError>;

    /// Overwrites every date tag of `path` in place with `date`.
    fn write_all_dates(&self, path: &Path, date: &str) -> Result<(), ExifToolError>;
}

/// How a closed exiftool process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The process exited on its own within the grace period.
    Exited(ExitStatus),
    /// The grace period elapsed and the process was killed.
    Killed,
}

/// The request/response channel to one exiftool process.
///
/// Requests carry no correlation id, so a conversation must be owned by exactly one caller from
/// the moment a command is written until its `{ready}` line has been read.
#[derive(Debug)]
struct Conversation {
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    stderr: Receiver<String>,
}

impl Conversation {
    /// Sends one command and returns the stdout lines printed before `{ready}`.
    ///
    /// # Command Format Sent to ExifTool via Stdin
    /// ```text
    /// arg1
    /// arg2
    /// ...
    /// -execute
    /// ```
    fn request(&mut self, args: &[&str]) -> Result<Vec<String>, ExifToolError> {
        // Stale stderr belongs to an earlier command.
        while let Ok(line) = self.stderr.try_recv() {
            debug!("exiftool: {}", line);
        }

        let stdin = self.stdin.as_mut().ok_or(ExifToolError::Closed)?;
        for arg in args {
            writeln!(stdin, "{}", arg)?;
        }
        writeln!(stdin, "-execute")?;
        stdin.flush()?;

        self.read_until_ready()
    }

    /// Lines are decoded lossily so a stray non UTF-8 byte can never end the read before
    /// `{ready}` and leave the rest of the response for the next request.
    fn read_until_ready(&mut self) -> Result<Vec<String>, ExifToolError> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.stdout.read_until(b'\n', &mut buf)? == 0 {
                // EOF before "{ready}": the process is gone.
                return Err(ExifToolError::ProcessTerminated);
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if line == READY_MARKER {
                return Ok(lines);
            }
            lines.push(line.to_string());
        }
    }

    /// Collects stderr lines of the last command.
    ///
    /// stderr travels through a separate pipe, so messages may trail the `{ready}` line slightly.
    fn drain_stderr(&mut self) -> Result<Vec<String>, ExifToolError> {
        let mut err_lines = Vec::new();
        let start_time = Instant::now();

        while start_time.elapsed() < STDERR_POLL_TIMEOUT {
            loop {
                match self.stderr.try_recv() {
                    Ok(line) => err_lines.push(line),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        return if err_lines.is_empty() {
                            Err(ExifToolError::StderrDisconnected)
                        } else {
                            Ok(err_lines)
                        };
                    }
                }
            }
            if !err_lines.is_empty() {
                // expect all errors to come in a burst
                break;
            }
            thread::sleep(STDERR_POLL_INTERVAL);
        }
        Ok(err_lines)
    }
}

/// One persistent `exiftool -stay_open True -@ -` process.
///
/// Every method takes `&self`: the handle owns an exclusive [`Conversation`] guard, so callers
/// sharing a handle are serialized per command and never see each other's output.
#[derive(Debug)]
pub struct ExifTool {
    conversation: Mutex<Conversation>,
    child: Mutex<Child>,
    pid: u32,
    shutdown_grace: Duration,
}

impl ExifTool {
    /// Launches `exiftool` from `PATH`.
    pub fn new() -> Result<Self, ExifToolError> {
        Self::with_executable(Path::new("exiftool"))
    }

    /// Launches `exiftool` from a specific path.
    pub fn with_executable(exiftool_path: &Path) -> Result<Self, ExifToolError> {
        Self::spawn(Command::new(exiftool_path))
    }

    /// Launches `command` in stay-open mode, appending the arguments that make it read commands
    /// from stdin.
    pub fn spawn(mut command: Command) -> Result<Self, ExifToolError> {
        let mut child = command
            .arg("-stay_open")
            .arg("True")
            .arg("-@")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ExifToolError::ExifToolNotFound)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("Failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("Failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("Failed to capture stderr"))?;

        let pid = child.id();
        let (stderr_sender, stderr_receiver) = mpsc::channel();
        let mut stderr_reader = BufReader::new(stderr);
        thread::Builder::new()
            .name(format!("exiftool-stderr-{}", pid))
            .spawn(move || {
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match stderr_reader.read_until(b'\n', &mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if stderr_sender.send(line).is_err() {
                        break;
                    }
                }
            })?;

        debug!("Started exiftool process {}", pid);
        Ok(Self {
            conversation: Mutex::new(Conversation {
                stdin: Some(BufWriter::new(stdin)),
                stdout: BufReader::new(stdout),
                stderr: stderr_receiver,
            }),
            child: Mutex::new(child),
            pid,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }

    /// Sets how long [`close`](Self::close) waits for a graceful exit before killing.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Takes exclusive ownership of the conversation for one request/response exchange.
    fn converse(&self) -> Result<MutexGuard<'_, Conversation>, ExifToolError> {
        self.conversation
            .lock()
            .map_err(|_| ExifToolError::ConversationPoisoned)
    }

    /// Reads all tags of a file with dates rendered as [`DATE_FORMAT`].
    ///
    /// Runs `exiftool -json -dateFormat "%Y:%m:%d %H:%M:%S" {path}` and keeps only the
    /// string-valued tags of the single returned object.
    pub fn read_metadata(&self, path: &Path) -> Result<HashMap<String, String>, ExifToolError> {
        let path_str = path.to_string_lossy();
        let args = ["-json", "-dateFormat", DATE_FORMAT, path_str.as_ref()];
        let lines = self.converse()?.request(&args)?;

        let output = lines.join("\n");
        let output = output.trim();
        if output.is_empty() {
            return Ok(HashMap::new());
        }

        let unexpected = || ExifToolError::UnexpectedFormat {
            path: path_str.to_string(),
            command_args: args.join(" "),
        };
        match serde_json::from_str::<Value>(output)? {
            Value::Array(entries) => match entries.into_iter().next() {
                None => Ok(HashMap::new()),
                Some(Value::Object(tags)) => Ok(tags
                    .into_iter()
                    .filter_map(|(tag, value)| match value {
                        Value::String(s) => Some((tag, s)),
                        _ => None,
                    })
                    .collect()),
                Some(_) => Err(unexpected()),
            },
            _ => Err(unexpected()),
        }
    }

    /// Overwrites all date tags of a file in place.
    ///
    /// Runs `exiftool -overwrite_original -AllDates={date} {path}`. exiftool still answers
    /// `{ready}` after tag warnings, so any `Error:` or `Warning:` line is turned into an error.
    pub fn write_all_dates(&self, path: &Path, date: &str) -> Result<(), ExifToolError> {
        let path_str = path.to_string_lossy();
        let date_arg = format!("-AllDates={}", date);
        let args = ["-overwrite_original", date_arg.as_str(), path_str.as_ref()];

        let (stdout_lines, stderr_lines) = {
            let mut conversation = self.converse()?;
            let stdout_lines = conversation.request(&args)?;
            (stdout_lines, conversation.drain_stderr()?)
        };

        let failure = stdout_lines
            .iter()
            .chain(stderr_lines.iter())
            .find(|line| line.contains("Error:") || line.contains("Warning:"));
        match failure {
            Some(line) => Err(ExifToolError::ExifToolProcess {
                message: line.trim().to_string(),
                command_args: args.join(" "),
            }),
            None => Ok(()),
        }
    }

    /// Asks the process to leave stay-open mode, closes its stdin and waits for it to exit.
    ///
    /// If it is still running once the grace period elapses it is killed. Closing an already
    /// closed or exited process just reports how it ended.
    pub fn close(&self) -> Result<Shutdown, ExifToolError> {
        let conversation = match self.conversation.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        };
        match conversation {
            Some(mut conversation) => {
                if let Some(mut stdin) = conversation.stdin.take() {
                    let sent = writeln!(stdin, "-stay_open\nFalse\n-execute")
                        .and_then(|_| stdin.flush());
                    if let Err(e) = sent {
                        debug!("exiftool process {} refused shutdown: {}", self.pid, e);
                    }
                    // Dropping stdin closes the pipe.
                }
            }
            None => warn!(
                "exiftool process {} is mid-command, skipping graceful shutdown",
                self.pid
            ),
        }

        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.shutdown_grace;
        loop {
            if let Some(status) = child.try_wait()? {
                debug!("exiftool process {} exited with {}", self.pid, status);
                return Ok(Shutdown::Exited(status));
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }

        warn!(
            "exiftool process {} did not exit within {:?}, killing it",
            self.pid, self.shutdown_grace
        );
        child.kill()?;
        child.wait()?;
        Ok(Shutdown::Killed)
    }
}

impl MetadataTool for ExifTool {
    fn read_metadata(&self, path: &Path) -> Result<HashMap<String, String>, ExifToolError> {
        ExifTool::read_metadata(self, path)
    }

    fn write_all_dates(&self, path: &Path, date: &str) -> Result<(), ExifToolError> {
        ExifTool::write_all_dates(self, path, date)
    }
}

impl Drop for ExifTool {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!("Closing exiftool process {} failed: {}", self.pid, e);
            let child = self.child.get_mut().unwrap_or_else(PoisonError::into_inner);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::utils::test_helpers::{fake_exiftool, hung_exiftool, sh};
    use assert_matches::assert_matches;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fake() -> Result<(TempDir, ExifTool), ExifToolError> {
        let dir = tempfile::tempdir()?;
        let script = fake_exiftool(dir.path())?;
        let exiftool = ExifTool::spawn(sh(&script))?;
        Ok((dir, exiftool))
    }

    #[test]
    fn test_new_invalid_path() {
        let result = ExifTool::with_executable(Path::new("nonexistent_exiftool_command"));
        assert_matches!(result, Err(ExifToolError::ExifToolNotFound(_)));
    }

    #[test]
    fn test_read_metadata_keeps_string_tags() -> Result<(), ExifToolError> {
        let (dir, et) = fake()?;
        let path = dir.path().join("IMG_1.jpg");
        let tags = et.read_metadata(&path)?;

        assert_eq!(tags.get("SourceFile"), Some(&path.to_string_lossy().into_owned()));
        assert_eq!(tags.get("FileName").map(String::as_str), Some("IMG_1.jpg"));
        assert_eq!(
            tags.get("DateTimeOriginal").map(String::as_str),
            Some("2021:06:01 10:00:00")
        );
        // numeric tags are dropped
        assert!(!tags.contains_key("ImageWidth"));
        Ok(())
    }

    #[test]
    fn test_read_metadata_empty_output() -> Result<(), ExifToolError> {
        let (dir, et) = fake()?;
        let tags = et.read_metadata(&dir.path().join("missing.jpg"))?;
        assert!(tags.is_empty());

        // the conversation is still usable afterwards
        let tags = et.read_metadata(&dir.path().join("nodate.jpg"))?;
        assert_eq!(tags.get("FileName").map(String::as_str), Some("nodate.jpg"));
        assert!(!tags.contains_key("DateTimeOriginal"));
        Ok(())
    }

    #[test]
    fn test_read_metadata_rejects_non_object_entry() -> Result<(), ExifToolError> {
        let (dir, et) = fake()?;
        let path = dir.path().join("scalar.jpg");
        let result = et.read_metadata(&path);
        assert_matches!(
            result,
            Err(ExifToolError::UnexpectedFormat { path: reported, command_args })
                if reported == path.to_string_lossy() && command_args.starts_with("-json ")
        );
        Ok(())
    }

    #[test]
    fn test_non_utf8_output_keeps_responses_paired() -> Result<(), ExifToolError> {
        let (dir, et) = fake()?;
        let tags = et.read_metadata(&dir.path().join("latin.jpg"))?;
        assert_eq!(tags.get("Title").map(String::as_str), Some("caf\u{FFFD}"));

        for name in ["next.jpg", "third.jpg"] {
            let path = dir.path().join(name);
            let tags = et.read_metadata(&path)?;
            assert_eq!(tags.get("SourceFile"), Some(&path.to_string_lossy().into_owned()));
        }
        Ok(())
    }

    #[test]
    fn test_write_all_dates() -> Result<(), ExifToolError> {
        let (dir, et) = fake()?;
        et.write_all_dates(&dir.path().join("a.jpg"), "2023:01:01 00:00:00")?;
        Ok(())
    }

    #[test]
    fn test_write_warning_is_an_error() -> Result<(), ExifToolError> {
        let (dir, et) = fake()?;
        let result = et.write_all_dates(&dir.path().join("warn.jpg"), "2023:01:01 00:00:00");
        assert_matches!(
            result,
            Err(ExifToolError::ExifToolProcess { message, .. }) if message.starts_with("Warning:")
        );

        // the ready marker was consumed, the next command pairs correctly
        let path = dir.path().join("after.jpg");
        let tags = et.read_metadata(&path)?;
        assert_eq!(tags.get("FileName").map(String::as_str), Some("after.jpg"));
        Ok(())
    }

    #[test]
    fn test_shared_handle_keeps_responses_paired() -> Result<(), ExifToolError> {
        let (dir, et) = fake()?;
        let et = Arc::new(et);
        let root = dir.path().to_path_buf();

        let threads: Vec<_> = (0..4)
            .map(|worker| {
                let et = Arc::clone(&et);
                let root = root.clone();
                thread::spawn(move || -> Result<(), ExifToolError> {
                    for i in 0..25 {
                        let path: PathBuf = root.join(format!("w{}_{}.jpg", worker, i));
                        let tags = et.read_metadata(&path)?;
                        assert_eq!(
                            tags.get("SourceFile"),
                            Some(&path.to_string_lossy().into_owned()),
                            "response belongs to another request"
                        );
                    }
                    Ok(())
                })
            })
            .collect();

        for t in threads {
            t.join().expect("worker thread panicked")?;
        }
        Ok(())
    }

    #[test]
    fn test_close_is_graceful_and_idempotent() -> Result<(), ExifToolError> {
        let (dir, et) = fake()?;
        et.read_metadata(&dir.path().join("a.jpg"))?;

        let first = et.close()?;
        assert_matches!(first, Shutdown::Exited(status) if status.success());
        let second = et.close()?;
        assert_eq!(first, second);

        let result = et.read_metadata(&dir.path().join("a.jpg"));
        assert_matches!(result, Err(ExifToolError::Closed));
        Ok(())
    }

    #[test]
    fn test_close_kills_hung_process() -> Result<(), ExifToolError> {
        let dir = tempfile::tempdir()?;
        let script = hung_exiftool(dir.path())?;
        let et = ExifTool::spawn(sh(&script))?.with_shutdown_grace(Duration::from_millis(200));

        let start = Instant::now();
        assert_eq!(et.close()?, Shutdown::Killed);
        assert!(start.elapsed() < Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn test_real_exiftool_when_installed() -> Result<(), ExifToolError> {
        if Command::new("exiftool").arg("-ver").output().is_err() {
            return Ok(());
        }
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.txt");
        std::fs::write(&path, "test content")?;

        let et = ExifTool::new()?;
        for _ in 0..3 {
            let tags = et.read_metadata(&path)?;
            assert_eq!(tags.get("FileName").map(String::as_str), Some("test.txt"));
        }
        assert_matches!(et.close()?, Shutdown::Exited(_));
        Ok(())
    }
}
