//! Transaction Log Module
//!
//! Provides durability by recording every mutation after it is applied
//! in memory, and rebuilds the store from that record on startup.
//!
//! ## Responsibilities
//! - Queue mutations from request handlers (bounded, FIFO)
//! - Persist them from a single background writer that assigns sequences
//! - Report write failures on a separate error stream
//! - Replay the durable medium in sequence order during recovery
//!
//! ## Lifecycle
//! ```text
//!   open ──► replay (optional, any number of times) ──► start ──► close
//!                                                        │
//!                                 write_put / write_delete only here
//! ```
//!
//! ## Backends
//! - [`FileTransactionLog`]: one `sequence\tkind\tkey\tvalue` line per event
//! - [`SqliteTransactionLog`]: one row per event in a `transactions` table

mod event;
mod file;
mod pipeline;
mod recovery;
mod sqlite;

use crossbeam::channel::Receiver;

use crate::error::{LedgerError, Result};

pub use event::{check_text_fields, Event, EventKind};
pub use file::FileTransactionLog;
pub use recovery::{initialize, open_log, replay_into, RecoveryResult};
pub use sqlite::SqliteTransactionLog;

/// The two lazy streams produced by [`TransactionLog::replay`]
///
/// `events` closes after the last event or right after an error has been
/// pushed onto `errors`, so draining `events` first and then checking
/// `errors` never misses a failure.
pub struct Replay {
    pub events: Receiver<Event>,
    pub errors: Receiver<LedgerError>,
}

/// Capability shared by every durable-medium backend
pub trait TransactionLog: Send + Sync {
    /// Queue a Put event. Blocks while the pending queue is full.
    fn write_put(&self, key: &str, value: &str) -> Result<()>;

    /// Queue a Delete event. Blocks while the pending queue is full.
    fn write_delete(&self, key: &str) -> Result<()>;

    /// Stream of background write failures
    fn errors(&self) -> Receiver<LedgerError>;

    /// Read the durable medium from the beginning. Not allowed once started.
    fn replay(&self) -> Result<Replay>;

    /// Spawn the single background writer
    fn start(&self) -> Result<()>;

    /// Stop accepting writes, drain the queue and join the writer
    fn close(&self) -> Result<()>;

    /// Highest sequence known to be durable
    fn last_sequence(&self) -> u64;

    /// Check that the medium can record this pair before the store is mutated
    fn check(&self, key: &str, _value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(LedgerError::InvalidKey("key must not be empty".to_string()));
        }
        Ok(())
    }
}
