//! SQLite Transaction Log
//!
//! One row per event in a `transactions` table. SQLite assigns `sequence`
//! through its AUTOINCREMENT primary key, so sequences are never reused
//! even if rows were removed by hand.
//!
//! ## Schema
//! ```text
//! transactions(
//!     sequence    INTEGER PRIMARY KEY AUTOINCREMENT,
//!     event_type  SMALLINT NOT NULL,   -- 1 = Delete, 2 = Put
//!     key         TEXT NOT NULL,
//!     value       TEXT NOT NULL
//! )
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::thread;

use crossbeam::channel::{bounded, unbounded, Receiver};
use rusqlite::{params, Connection};

use crate::error::{LedgerError, Result};

use super::event::SequenceGuard;
use super::pipeline::{EventSink, LogPipeline};
use super::{Event, EventKind, Replay, TransactionLog};

const TABLE: &str = "transactions";

const CREATE_TABLE: &str = "CREATE TABLE transactions (
    sequence    INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type  SMALLINT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT NOT NULL
)";

const INSERT_EVENT: &str = "INSERT INTO transactions (event_type, key, value) VALUES (?1, ?2, ?3)";

const SELECT_EVENTS: &str =
    "SELECT sequence, event_type, key, value FROM transactions ORDER BY sequence";

/// Transaction log backed by a SQLite table
pub struct SqliteTransactionLog {
    /// Database file; each phase opens its own connection
    path: PathBuf,

    pipeline: LogPipeline,
}

impl SqliteTransactionLog {
    /// Open (or create) the database and make sure the table exists
    pub fn open(path: &Path, queue_capacity: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LedgerError::MediumUnavailable(format!(
                    "cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = connect(path)?;
        ensure_table(&conn).map_err(|e| {
            LedgerError::MediumUnavailable(format!("cannot prepare table {}: {}", TABLE, e))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            pipeline: LogPipeline::new(queue_capacity),
        })
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransactionLog for SqliteTransactionLog {
    fn write_put(&self, key: &str, value: &str) -> Result<()> {
        self.pipeline.submit(Event::put(key, value))
    }

    fn write_delete(&self, key: &str) -> Result<()> {
        self.pipeline.submit(Event::delete(key))
    }

    fn errors(&self) -> Receiver<LedgerError> {
        self.pipeline.errors()
    }

    fn replay(&self) -> Result<Replay> {
        self.pipeline.ensure_replayable()?;

        let (events_tx, events_rx) = bounded(self.pipeline.capacity());
        let (errors_tx, errors_rx) = unbounded();
        let path = self.path.clone();
        let tracker = self.pipeline.sequence_tracker();

        thread::Builder::new()
            .name("txlog-sqlite-replay".to_string())
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
        let conn = connect(&self.path)?;
        self.pipeline.start("txlog-sqlite-writer", SqliteSink { conn })
    }

    fn close(&self) -> Result<()> {
        self.pipeline.close()
    }

    fn last_sequence(&self) -> u64 {
        self.pipeline.last_sequence()
    }
}

fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| {
        LedgerError::MediumUnavailable(format!("cannot open {}: {}", path.display(), e))
    })?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Check-then-create; running it against an existing table is a no-op
fn ensure_table(conn: &Connection) -> rusqlite::Result<()> {
    if table_exists(conn)? {
        return Ok(());
    }
    tracing::info!(table = TABLE, "Creating transaction table");
    conn.execute_batch(CREATE_TABLE)
}

fn table_exists(conn: &Connection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![TABLE],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Stream rows in sequence order without materializing the result set
fn scan(path: &Path, mut emit: impl FnMut(Event) -> bool) -> Result<()> {
    let conn = connect(path)?;

    let query_failed = |row: u64, e: rusqlite::Error| LedgerError::corrupt(row, format!("query failed: {}", e));

    let mut stmt = conn.prepare(SELECT_EVENTS).map_err(|e| query_failed(0, e))?;
    let mut rows = stmt.query([]).map_err(|e| query_failed(0, e))?;
    let mut guard = SequenceGuard::default();
    let mut position = 0u64;

    while let Some(row) = rows.next().map_err(|e| query_failed(position + 1, e))? {
        position += 1;

        let sequence: i64 = row.get(0).map_err(|e| query_failed(position, e))?;
        let code: i64 = row.get(1).map_err(|e| query_failed(position, e))?;
        let key: String = row.get(2).map_err(|e| query_failed(position, e))?;
        let value: String = row.get(3).map_err(|e| query_failed(position, e))?;

        let kind = EventKind::from_code(code)
            .ok_or_else(|| LedgerError::corrupt(position, format!("invalid event type {}", code)))?;
        let sequence = u64::try_from(sequence)
            .map_err(|_| LedgerError::corrupt(position, format!("invalid sequence {}", sequence)))?;

        let event = Event::from_parts(sequence, kind, key, value, position)?;
        guard.check(&event, position)?;

        if !emit(event) {
            break;
        }
    }

    Ok(())
}

/// Writer-side half of the SQLite log; owns its own connection
struct SqliteSink {
    conn: Connection,
}

impl EventSink for SqliteSink {
    fn append(&mut self, event: &mut Event) -> Result<()> {
        {
            let mut stmt = self.conn.prepare_cached(INSERT_EVENT)?;
            stmt.execute(params![event.kind.code(), event.key, event.value])?;
        }
        event.sequence = self.conn.last_insert_rowid() as u64;
        Ok(())
    }
}
