//! File Transaction Log
//!
//! Append-only text file, one event per line:
//!
//! ```text
//! 1	2	foo	bar
//! 2	2	bob	alice
//! 3	1	foo
//! ```
//!
//! Columns are `sequence`, `kind` (1 = Delete, 2 = Put), `key`, `value`,
//! separated by a single tab. The value column is empty for deletes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::thread;

use crossbeam::channel::{bounded, unbounded};
use parking_lot::Mutex;

use crate::config::WalSyncStrategy;
use crate::error::{LedgerError, Result};

use super::event::{check_text_fields, SequenceGuard};
use super::pipeline::{EventSink, LogPipeline};
use super::{Event, Replay, TransactionLog};

/// Transaction log backed by an append-only file
pub struct FileTransactionLog {
    /// Location of the log file
    path: PathBuf,

    /// Append handle, handed to the writer on `start`
    file: Mutex<Option<File>>,

    sync_strategy: WalSyncStrategy,

    pipeline: LogPipeline,
}

impl FileTransactionLog {
    /// Open (or create) the log file for appending
    pub fn open(path: &Path, queue_capacity: usize, sync_strategy: WalSyncStrategy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LedgerError::MediumUnavailable(format!(
                    "cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LedgerError::MediumUnavailable(format!("cannot open {}: {}", path.display(), e))
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
            sync_strategy,
            pipeline: LogPipeline::new(queue_capacity),
        })
    }

    /// Get the log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event in the file synchronously.
    ///
    /// Used for offline inspection; stops at the first bad line.
    pub fn read_all(path: &Path) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        scan(path, |event| {
            events.push(event);
            true
        })?;
        Ok(events)
    }
}

impl TransactionLog for FileTransactionLog {
    fn write_put(&self, key: &str, value: &str) -> Result<()> {
        self.pipeline.submit(Event::put(key, value))
    }

    fn write_delete(&self, key: &str) -> Result<()> {
        self.pipeline.submit(Event::delete(key))
    }

    fn errors(&self) -> crossbeam::channel::Receiver<LedgerError> {
        self.pipeline.errors()
    }

    fn replay(&self) -> Result<Replay> {
        self.pipeline.ensure_replayable()?;

        let (events_tx, events_rx) = bounded(self.pipeline.capacity());
        let (errors_tx, errors_rx) = unbounded();
        let path = self.path.clone();
        let tracker = self.pipeline.sequence_tracker();

        thread::Builder::new()
            .name("txlog-file-replay".to_string())
            .spawn(move || {
                let result = scan(&path, |event| {
                    tracker.fetch_max(event.sequence, Ordering::AcqRel);
                    events_tx.send(event).is_ok()
                });
                if let Err(e) = result {
                    let _ = errors_tx.send(e);
                }
            })?;

        Ok(Replay {
            events: events_rx,
            errors: errors_rx,
        })
    }

    fn start(&self) -> Result<()> {
        // Appending after an unterminated line would glue the next record
        // onto it.
        if !ends_cleanly(&self.path)? {
            return Err(LedgerError::LogState(format!(
                "{} ends with an unterminated line",
                self.path.display()
            )));
        }

        let file = self
            .file
            .lock()
            .take()
            .ok_or_else(|| LedgerError::LogState("log file already handed to a writer".to_string()))?;
        let len = file.metadata()?.len();

        let sink = FileSink {
            file,
            len,
            last_sequence: self.pipeline.last_sequence(),
            sync_strategy: self.sync_strategy,
            unsynced: 0,
            disabled: None,
        };

        self.pipeline.start("txlog-file-writer", sink)
    }

    fn close(&self) -> Result<()> {
        self.pipeline.close()
    }

    fn last_sequence(&self) -> u64 {
        self.pipeline.last_sequence()
    }

    fn check(&self, key: &str, value: &str) -> Result<()> {
        check_text_fields(key, value)
    }
}

/// Walk the file line by line, handing each valid event to `emit` until it
/// returns false. The first malformed line ends the scan with an error.
///
/// Every record must end with `\n`; a final line without one is a torn
/// write, even if its fields happen to parse.
fn scan(path: &Path, mut emit: impl FnMut(Event) -> bool) -> Result<()> {
    let file = File::open(path).map_err(|e| {
        LedgerError::MediumUnavailable(format!("cannot read {}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);
    let mut guard = SequenceGuard::default();
    let mut line = String::new();
    let mut line_no = 0u64;

    loop {
        line.clear();
        line_no += 1;
        let read = reader
            .read_line(&mut line)
            .map_err(|e| LedgerError::corrupt(line_no, format!("read failed: {}", e)))?;
        if read == 0 {
            break;
        }

        let Some(record) = line.strip_suffix('\n') else {
            return Err(LedgerError::corrupt(line_no, "unterminated final line"));
        };

        let event = Event::parse_line(record, line_no)?;
        guard.check(&event, line_no)?;

        if !emit(event) {
            break;
        }
    }

    Ok(())
}

/// True if the file is empty or its last byte is a newline
fn ends_cleanly(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| {
        LedgerError::MediumUnavailable(format!("cannot read {}: {}", path.display(), e))
    })?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Writer-side half of the file log
///
/// An append either lands as one complete, terminated line (synced when
/// the strategy asks for it) or leaves the file exactly as it was. If the
/// file cannot be restored after a failure the sink disables itself, so a
/// sequence number is never written twice.
struct FileSink {
    file: File,

    /// Length of the file up to the last committed line
    len: u64,

    last_sequence: u64,
    sync_strategy: WalSyncStrategy,
    unsynced: usize,

    /// Set once the file could not be rolled back after a failed append
    disabled: Option<String>,
}

impl FileSink {
    fn sync_due(&self) -> bool {
        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count,
        }
    }

    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.file.write_all(line)?;
        if self.sync_due() {
            self.file.sync_data()?;
            self.unsynced = 0;
        } else {
            self.unsynced += 1;
        }
        Ok(())
    }

    /// Cut the file back to the last committed line
    fn roll_back(&mut self, cause: io::Error) -> LedgerError {
        if let Err(e) = self.file.set_len(self.len) {
            tracing::error!(
                error = %e,
                len = self.len,
                "Cannot roll back partial log write; disabling writer"
            );
            self.disabled = Some(format!("rollback failed after '{}': {}", cause, e));
        }
        LedgerError::Io(cause)
    }
}

impl EventSink for FileSink {
    fn append(&mut self, event: &mut Event) -> Result<()> {
        if let Some(reason) = &self.disabled {
            return Err(LedgerError::DurableWrite(format!(
                "writer disabled: {}",
                reason
            )));
        }

        let sequence = self.last_sequence + 1;
        event.sequence = sequence;
        let line = event.to_line();

        if let Err(e) = self.write_line(line.as_bytes()) {
            return Err(self.roll_back(e));
        }

        self.len += line.len() as u64;
        self.last_sequence = sequence;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.disabled.is_some() {
            return Ok(());
        }
        self.file.sync_data()?;
        Ok(())
    }
}
