#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Recorder that buffers sample rows and appends them to a persistent CSV log.
//!
//! Rows live in memory for the whole run and reach disk in a single append when the
//! run finishes. The log is never truncated below the length it had before a flush.

use std::{
    fmt::Write as _,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use physics_stress_core::{SampleRecord, LOG_HEADER};
use thiserror::Error;

/// Errors raised while persisting the sample log.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The directory holding the log could not be created.
    #[error("failed to create log directory {path}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The header row could not be written.
    #[error("failed to write header to {path}")]
    WriteHeader {
        /// Log file receiving the header.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Buffered rows could not be appended.
    #[error("failed to append {rows} rows to {path}")]
    Append {
        /// Log file receiving the rows.
        path: PathBuf,
        /// Rows that were meant to be written.
        rows: usize,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Whether [`ensure_header`] had to create the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderStatus {
    /// The log already existed and was left untouched.
    Present,
    /// The log was created with a header row.
    Written,
}

/// Creates the log with a single header row unless it already exists.
pub fn ensure_header(path: &Path) -> Result<HeaderStatus, RecorderError> {
    create_parent(path)?;

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
            debug!("log {} already exists", path.display());
            return Ok(HeaderStatus::Present);
        }
        Err(source) => {
            return Err(RecorderError::WriteHeader {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    write_header(&mut file).map_err(|source| RecorderError::WriteHeader {
        path: path.to_path_buf(),
        source,
    })?;
    info!("created sample log {}", path.display());
    Ok(HeaderStatus::Written)
}

/// Appends the CSV representation of `record` to `out`, including the line terminator.
pub fn write_row(out: &mut String, record: &SampleRecord) {
    let _ = writeln!(
        out,
        "{:.2},{},{:.1},{:.4},{},{}",
        record.elapsed_seconds,
        record.target_count,
        record.frames_per_second,
        record.frame_time_ms,
        record.memory_used_mb,
        record.active_body_count,
    );
}

/// Ordered in-memory buffer of the current run's rows.
#[derive(Debug, Default)]
pub struct Recorder {
    buffer: Vec<SampleRecord>,
}

impl Recorder {
    /// Creates a recorder with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every buffered row.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Buffers one row after all previously appended ones.
    pub fn append(&mut self, record: SampleRecord) {
        self.buffer.push(record);
    }

    /// Rows buffered for the current run, in insertion order.
    #[must_use]
    pub fn records(&self) -> &[SampleRecord] {
        &self.buffer
    }

    /// Number of buffered rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Reports whether no rows are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Renders the whole buffer as CSV rows.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.buffer.len() * 48);
        for record in &self.buffer {
            write_row(&mut out, record);
        }
        out
    }

    /// Appends every buffered row to the log at `path` in a single write.
    ///
    /// A missing or empty log receives the header in the same write. The buffer is kept
    /// intact whatever the outcome; on failure the file is cut back to its previous
    /// length so no partial rows remain. Returns the number of rows written.
    pub fn flush(&self, path: &Path) -> Result<usize, RecorderError> {
        let rows = self.buffer.len();
        if rows == 0 {
            debug!("nothing to flush to {}", path.display());
            return Ok(0);
        }

        let append_error = |source| RecorderError::Append {
            path: path.to_path_buf(),
            rows,
            source,
        };

        create_parent(path)?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(append_error)?;
        let original_len = file.metadata().map_err(append_error)?.len();

        let mut payload = String::new();
        if original_len == 0 {
            payload.push_str(LOG_HEADER);
            payload.push('\n');
        }
        payload.push_str(&self.render());

        append_or_rollback(&mut file, original_len, payload.as_bytes(), path)
            .map_err(append_error)?;

        info!("appended {rows} rows to {}", path.display());
        Ok(rows)
    }
}

fn create_parent(path: &Path) -> Result<(), RecorderError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| RecorderError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Append target that can be made durable and cut back after a failed write.
trait LogFile: Write {
    fn sync(&mut self) -> io::Result<()>;

    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

fn write_header(file: &mut File) -> io::Result<()> {
    let mut header = String::with_capacity(LOG_HEADER.len() + 1);
    header.push_str(LOG_HEADER);
    header.push('\n');
    write_durably(file, header.as_bytes())
}

fn write_durably<L: LogFile>(file: &mut L, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.sync()
}

/// Writes `payload` durably or restores the log to `original_len` bytes.
fn append_or_rollback<L: LogFile>(
    file: &mut L,
    original_len: u64,
    payload: &[u8],
    path: &Path,
) -> io::Result<()> {
    let Err(source) = write_durably(file, payload) else {
        return Ok(());
    };
    if let Err(rollback) = file.truncate(original_len) {
        warn!("could not discard partial rows in {}: {rollback}", path.display());
    }
    Err(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(elapsed_seconds: f32) -> SampleRecord {
        SampleRecord {
            elapsed_seconds,
            target_count: 250,
            frames_per_second: 59.94,
            frame_time_ms: 16.683_31,
            memory_used_mb: 812,
            active_body_count: 117,
        }
    }

    #[test]
    fn rows_use_fixed_precision() {
        let mut out = String::new();
        write_row(&mut out, &record(1.254));
        assert_eq!(out, "1.25,250,59.9,16.6833,812,117\n");
    }

    #[test]
    fn render_preserves_insertion_order() {
        let mut recorder = Recorder::new();
        recorder.append(record(0.5));
        recorder.append(record(0.25));

        let rendered = recorder.render();
        let times: Vec<&str> = rendered
            .lines()
            .map(|line| line.split(',').next().unwrap_or_default())
            .collect();
        assert_eq!(times, vec!["0.50", "0.25"]);
    }

    /// In-memory log whose device fills up after `capacity` bytes.
    struct ShortDevice {
        contents: Vec<u8>,
        capacity: usize,
        synced: bool,
    }

    impl io::Write for ShortDevice {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.contents.len());
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "device full"));
            }
            let accepted = room.min(buf.len());
            self.contents.extend_from_slice(&buf[..accepted]);
            Ok(accepted)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogFile for ShortDevice {
        fn sync(&mut self) -> io::Result<()> {
            self.synced = true;
            Ok(())
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.contents.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn failed_append_leaves_no_partial_rows() {
        let mut recorder = Recorder::new();
        for elapsed in [0.25, 0.5, 0.75] {
            recorder.append(record(elapsed));
        }
        let existing = format!("{LOG_HEADER}\n").into_bytes();
        let mut device = ShortDevice {
            capacity: existing.len() + 20,
            contents: existing.clone(),
            synced: false,
        };

        let result = append_or_rollback(
            &mut device,
            existing.len() as u64,
            recorder.render().as_bytes(),
            Path::new("short.csv"),
        );

        assert!(result.is_err());
        assert!(!device.synced);
        assert_eq!(device.contents, existing);
    }

    #[test]
    fn successful_append_is_synced() {
        let mut recorder = Recorder::new();
        recorder.append(record(0.25));
        let mut device = ShortDevice {
            contents: Vec::new(),
            capacity: usize::MAX,
            synced: false,
        };

        append_or_rollback(&mut device, 0, recorder.render().as_bytes(), Path::new("ok.csv"))
            .expect("append");

        assert!(device.synced);
        assert_eq!(device.contents, recorder.render().into_bytes());
    }
}
