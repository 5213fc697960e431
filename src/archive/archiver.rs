//! Store-only zip archiver
//!
//! Maps a file or directory tree to a single uncompressed zip archive.
//! Entry names are relative to the source itself: a file is stored under
//! its base name, a directory contributes its contents. Empty directories
//! are kept as directory entries.
//!
//! Symbolic links inside a tree are never followed; they are skipped with a
//! warning, which also rules out link cycles. A source path that is itself
//! a link is followed once.
//!
//! Directories registered with [`Archiver::excluding`] are never entered,
//! so an archive cannot swallow the snapshot store it is being written to.
//!
//! The archive is written to `<destination>.tmp` and renamed into place
//! only after it has been synced, so a failed run never leaves a partial
//! archive at the final path.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use chrono::{Datelike, Local, Timelike};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::logging::RunLog;

/// Files at or above this size need zip64 headers
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// What ended up in an archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
    /// Links found inside the tree and left out
    pub skipped_links: Vec<PathBuf>,
}

/// Produces one archive per source path
#[derive(Debug, Clone)]
pub struct Archiver {
    timeout: Duration,
    excluded: Vec<PathBuf>,
}

impl Archiver {
    /// Create an archiver whose calls must finish within `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            excluded: Vec::new(),
        }
    }

    /// Never descend into `dir` while walking a source tree
    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    /// Archive `source` into `destination`.
    ///
    /// Parent directories of `destination` are created as needed.
    pub fn archive(
        &self,
        source: &Path,
        destination: &Path,
        log: &mut RunLog,
    ) -> Result<ArchiveStats, ArchiveError> {
        let metadata = fs::metadata(source).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ArchiveError::SourceMissing(source.to_path_buf())
            } else {
                read_error(source, e)
            }
        })?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
        }

        let temp_path = temp_path_for(destination);
        let deadline = Deadline::new(source, self.timeout);

        let excluded: Vec<PathBuf> = self
            .excluded
            .iter()
            .filter_map(|dir| fs::canonicalize(dir).ok())
            .collect();

        let result = write_archive(source, &metadata, &temp_path, &excluded, &deadline, log).and_then(
            |stats| {
                fs::rename(&temp_path, destination).map_err(|e| write_error(destination, e))?;
                Ok(stats)
            },
        );

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }

        result
    }
}

/// `<destination>.tmp` in the same directory, so the final rename is atomic
fn temp_path_for(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    destination.with_file_name(name)
}

struct Deadline<'a> {
    source: &'a Path,
    started: Instant,
    limit: Duration,
}

impl<'a> Deadline<'a> {
    fn new(source: &'a Path, limit: Duration) -> Self {
        Self {
            source,
            started: Instant::now(),
            limit,
        }
    }

    fn check(&self) -> Result<(), ArchiveError> {
        if self.started.elapsed() >= self.limit {
            return Err(ArchiveError::TimedOut {
                path: self.source.to_path_buf(),
                secs: self.limit.as_secs(),
            });
        }
        Ok(())
    }
}

fn write_archive(
    source: &Path,
    metadata: &fs::Metadata,
    temp_path: &Path,
    excluded: &[PathBuf],
    deadline: &Deadline<'_>,
    log: &mut RunLog,
) -> Result<ArchiveStats, ArchiveError> {
    let file = File::create(temp_path).map_err(|e| write_error(temp_path, e))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let mut stats = ArchiveStats::default();

    if metadata.is_dir() {
        add_tree(&mut writer, source, temp_path, excluded, deadline, &mut stats, log)?;
    } else {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| read_error(source, io::Error::other("source has no file name")))?;
        add_file(&mut writer, source, &name, temp_path, deadline, &mut stats)?;
    }

    let buffered = writer.finish()?;
    let file = buffered
        .into_inner()
        .map_err(|e| write_error(temp_path, e.into_error()))?;
    file.sync_all().map_err(|e| write_error(temp_path, e))?;

    Ok(stats)
}

fn add_tree<W: Write + io::Seek>(
    writer: &mut ZipWriter<W>,
    source: &Path,
    temp_path: &Path,
    excluded: &[PathBuf],
    deadline: &Deadline<'_>,
    stats: &mut ArchiveStats,
    log: &mut RunLog,
) -> Result<(), ArchiveError> {
    let mut walker = WalkDir::new(source)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        deadline.check()?;

        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            let reason = e.to_string();
            ArchiveError::SourceRead { path, reason }
        })?;

        let path = entry.path();
        let relative = path.strip_prefix(source).map_err(|e| {
            read_error(path, io::Error::other(e.to_string()))
        })?;
        let name = entry_name(relative, log);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            log.warn(format!("Skipping symbolic link {}", path.display()));
            stats.skipped_links.push(path.to_path_buf());
        } else if file_type.is_dir() && is_excluded(path, excluded) {
            log.warn(format!(
                "Skipping {}, it holds the snapshot store",
                path.display()
            ));
            walker.skip_current_dir();
        } else if file_type.is_dir() {
            writer
                .add_directory(format!("{}/", name), SimpleFileOptions::default())
                .map_err(|e| write_error(temp_path, io::Error::other(e.to_string())))?;
            stats.directories += 1;
        } else if file_type.is_file() {
            add_file(writer, path, &name, temp_path, deadline, stats)?;
        } else {
            log.warn(format!("Skipping special file {}", path.display()));
        }
    }

    Ok(())
}

fn is_excluded(dir: &Path, excluded: &[PathBuf]) -> bool {
    !excluded.is_empty()
        && fs::canonicalize(dir)
            .map(|canonical| excluded.contains(&canonical))
            .unwrap_or(false)
}

fn add_file<W: Write + io::Seek>(
    writer: &mut ZipWriter<W>,
    path: &Path,
    name: &str,
    temp_path: &Path,
    deadline: &Deadline<'_>,
    stats: &mut ArchiveStats,
) -> Result<(), ArchiveError> {
    let mut file = File::open(path).map_err(|e| read_error(path, e))?;
    let metadata = file.metadata().map_err(|e| read_error(path, e))?;

    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(metadata.len() >= ZIP64_THRESHOLD);
    if let Some(modified) = metadata.modified().ok().and_then(zip_timestamp) {
        options = options.last_modified_time(modified);
    }

    writer.start_file(name, options)?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(path, e)),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|e| write_error(temp_path, e))?;
        stats.bytes += read as u64;
        deadline.check()?;
    }

    stats.files += 1;
    Ok(())
}

/// Zip entry name for a path relative to the source, using `/` separators
fn entry_name(relative: &Path, log: &mut RunLog) -> String {
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            match part.to_str() {
                Some(s) => parts.push(s.to_string()),
                None => {
                    let lossy = part.to_string_lossy().into_owned();
                    log.warn(format!(
                        "File name is not valid UTF-8, stored as '{}'",
                        lossy
                    ));
                    parts.push(lossy);
                }
            }
        }
    }
    parts.join("/")
}

fn zip_timestamp(modified: SystemTime) -> Option<zip::DateTime> {
    let local: chrono::DateTime<Local> = modified.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}

fn read_error(path: &Path, err: io::Error) -> ArchiveError {
    ArchiveError::SourceRead {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn write_error(path: &Path, err: io::Error) -> ArchiveError {
    ArchiveError::DestinationWrite {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
