//! Per-run logger context
//!
//! A [`RunLog`] is created before anything else happens in a run and is
//! passed explicitly to every component. It starts out buffering entries in
//! memory because no snapshot directory exists yet; once INIT has created
//! one, the log is attached to `<snapshot>/run.log` and the buffer is
//! drained into it. Every entry is also mirrored to the console through
//! `tracing`.
//!
//! The file uses a line-delimited JSON format where each line is one
//! [`LogEntry`]. Each write is flushed immediately so a killed run still
//! leaves an auditable trail. If the file cannot be opened or written,
//! the log detaches and continues on the console only.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::entry::{Level, LogEntry};
use crate::error::{ColdsnapError, ColdsnapResult};
use crate::pipeline::Phase;

/// Where entries currently go
#[derive(Debug)]
enum Sink {
    /// No snapshot directory yet; keep entries in memory
    Buffering(Vec<LogEntry>),
    /// Appending to the run log file
    Attached { path: PathBuf, file: File },
    /// The file could not be written; console only from here on
    Detached,
}

/// Explicit logger context for one run
#[derive(Debug)]
pub struct RunLog {
    sink: Sink,
    phase: Option<Phase>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLog {
    /// Create a logger in the buffering state
    pub fn new() -> Self {
        Self {
            sink: Sink::Buffering(Vec::new()),
            phase: None,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Set the phase stamped on subsequent entries
    pub fn set_phase(&mut self, phase: Option<Phase>) {
        self.phase = phase;
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(Level::Info, message.into());
    }

    pub fn ok(&mut self, message: impl Into<String>) {
        self.record(Level::Ok, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(Level::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.record(Level::Error, message.into());
    }

    /// Attach the log to a file, draining any buffered entries into it.
    ///
    /// On failure the buffered entries are dropped (they already reached the
    /// console) and the run carries on with console-only output.
    pub fn attach(&mut self, path: impl Into<PathBuf>) -> ColdsnapResult<()> {
        let path = path.into();
        let pending = match &mut self.sink {
            Sink::Buffering(pending) => std::mem::take(pending),
            Sink::Attached { .. } => {
                return Err(ColdsnapError::Io(format!(
                    "Run log is already attached, cannot attach to {}",
                    path.display()
                )))
            }
            Sink::Detached => {
                return Err(ColdsnapError::Io(format!(
                    "Run log is console-only after a write failure, cannot attach to {}",
                    path.display()
                )))
            }
        };

        let opened = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ColdsnapError::Io(format!("Failed to open run log: {}", e)))
            .and_then(|mut file| {
                for entry in &pending {
                    write_entry(&mut file, entry)?;
                }
                Ok(file)
            });

        match opened {
            Ok(file) => {
                self.sink = Sink::Attached { path, file };
                Ok(())
            }
            Err(err) => {
                self.sink = Sink::Detached;
                self.warn(format!("Run log unavailable, continuing on console only: {}", err));
                Err(err)
            }
        }
    }

    /// Whether entries are being written to a file
    pub fn is_attached(&self) -> bool {
        matches!(self.sink, Sink::Attached { .. })
    }

    /// Path of the attached log file
    pub fn path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::Attached { path, .. } => Some(path),
            Sink::Buffering(_) | Sink::Detached => None,
        }
    }

    /// Entries still held in memory
    pub fn buffered(&self) -> &[LogEntry] {
        match &self.sink {
            Sink::Buffering(pending) => pending,
            Sink::Attached { .. } | Sink::Detached => &[],
        }
    }

    /// Warning messages recorded so far
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Error messages recorded so far
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn record(&mut self, level: Level, message: String) {
        emit_console(level, self.phase, &message);

        match level {
            Level::Warn => self.warnings.push(message.clone()),
            Level::Error => self.errors.push(message.clone()),
            Level::Info | Level::Ok => {}
        }

        let entry = LogEntry::new(level, self.phase, message);
        let failed = match &mut self.sink {
            Sink::Buffering(pending) => {
                pending.push(entry);
                None
            }
            Sink::Attached { file, .. } => write_entry(file, &entry).err(),
            Sink::Detached => None,
        };

        if let Some(err) = failed {
            self.sink = Sink::Detached;
            self.warn(format!(
                "Run log write failed, continuing on console only: {}",
                err
            ));
        }
    }

    /// Read all entries from a run log file, oldest first
    pub fn read_all(path: &Path) -> ColdsnapResult<Vec<LogEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)
            .map_err(|e| ColdsnapError::Io(format!("Failed to open run log: {}", e)))?;

        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                ColdsnapError::Io(format!("Failed to read run log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line).map_err(|e| {
                ColdsnapError::Json(format!(
                    "Failed to parse run log entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }
}

fn write_entry(file: &mut File, entry: &LogEntry) -> ColdsnapResult<()> {
    let json = serde_json::to_string(entry)
        .map_err(|e| ColdsnapError::Json(format!("Failed to serialize log entry: {}", e)))?;

    writeln!(file, "{}", json)
        .map_err(|e| ColdsnapError::Io(format!("Failed to write log entry: {}", e)))?;

    file.flush()
        .map_err(|e| ColdsnapError::Io(format!("Failed to flush run log: {}", e)))?;

    Ok(())
}

fn emit_console(level: Level, phase: Option<Phase>, message: &str) {
    let phase = phase.map(|p| p.to_string()).unwrap_or_default();
    match level {
        Level::Info => tracing::info!(phase = %phase, "{}", message),
        Level::Ok => tracing::info!(phase = %phase, ok = true, "{}", message),
        Level::Warn => tracing::warn!(phase = %phase, "{}", message),
        Level::Error => tracing::error!(phase = %phase, "{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_buffers_until_attached() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.log");

        let mut log = RunLog::new();
        log.info("loading configuration");
        log.warn("something odd");
        assert!(!log.is_attached());
        assert_eq!(log.buffered().len(), 2);

        log.attach(&path).unwrap();
        assert!(log.is_attached());
        assert!(log.buffered().is_empty());

        log.set_phase(Some(Phase::Quiesce));
        log.ok("stopped gitea");

        let entries = RunLog::read_all(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "loading configuration");
        assert_eq!(entries[1].level, Level::Warn);
        assert_eq!(entries[2].phase, Some(Phase::Quiesce));
    }

    #[test]
    fn test_counts_warnings_and_errors() {
        let mut log = RunLog::new();
        log.warn("a");
        log.warn("b");
        log.error("c");
        log.info("d");
        assert_eq!(log.warnings(), ["a", "b"]);
        assert_eq!(log.errors(), ["c"]);
    }

    #[test]
    fn test_attach_failure_goes_console_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("run.log");

        let mut log = RunLog::new();
        log.info("first");
        assert!(log.attach(&path).is_err());
        assert!(!log.is_attached());
        assert!(log.path().is_none());
        assert_eq!(log.warnings().len(), 1);

        // nothing accumulates in memory afterwards
        log.info("second");
        assert!(log.buffered().is_empty());
        assert!(log.attach(temp_dir.path().join("run.log")).is_err());
    }

    #[test]
    fn test_write_failure_detaches_and_counts_warning() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.log");
        File::create(&path).unwrap();

        let mut log = RunLog::new();
        // a read-only handle makes every write fail
        log.sink = Sink::Attached {
            path: path.clone(),
            file: File::open(&path).unwrap(),
        };

        log.info("archiving");
        assert!(!log.is_attached());
        assert_eq!(log.warnings().len(), 1);
        assert!(log.warnings()[0].contains("Run log write failed"));

        log.warn("later warning");
        assert!(log.buffered().is_empty());
        assert_eq!(log.warnings().len(), 2);
    }

    #[test]
    fn test_double_attach_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = RunLog::new();
        log.attach(temp_dir.path().join("a.log")).unwrap();
        assert!(log.attach(temp_dir.path().join("b.log")).is_err());
        assert_eq!(log.path(), Some(temp_dir.path().join("a.log").as_path()));
    }

    #[test]
    fn test_read_missing_log() {
        let temp_dir = TempDir::new().unwrap();
        assert!(RunLog::read_all(&temp_dir.path().join("none.log"))
            .unwrap()
            .is_empty());
    }
}
