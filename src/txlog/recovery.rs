//! Log Recovery
//!
//! Rebuilds the in-memory store from the transaction log at startup.

use crate::config::{Config, LogBackend};
use crate::error::{LedgerError, Result};
use crate::store::KvStore;

use super::{EventKind, FileTransactionLog, Replay, SqliteTransactionLog, TransactionLog};

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of events applied to the store
    pub events_replayed: u64,

    /// Deletes whose key was already absent (tolerated during replay)
    pub deletes_skipped: u64,

    /// Last durable sequence; the writer continues from here
    pub last_sequence: u64,
}

/// Open the durable medium selected by `config`
pub fn open_log(config: &Config) -> Result<Box<dyn TransactionLog>> {
    let path = config.log_path();
    let log: Box<dyn TransactionLog> = match config.log_backend {
        LogBackend::File => Box::new(FileTransactionLog::open(
            &path,
            config.queue_capacity,
            config.wal_sync_strategy,
        )?),
        LogBackend::Sqlite => Box::new(SqliteTransactionLog::open(&path, config.queue_capacity)?),
    };

    tracing::debug!(backend = ?config.log_backend, path = %path.display(), "Transaction log opened");
    Ok(log)
}

/// Apply every replayed event to `store`, in order.
///
/// A replayed delete of an absent key is counted and skipped; any replay
/// error is returned as soon as the event stream ends.
pub fn replay_into(log: &dyn TransactionLog, store: &KvStore) -> Result<RecoveryResult> {
    let Replay { events, errors } = log.replay()?;
    let mut result = RecoveryResult::default();

    for event in events.iter() {
        match event.kind {
            EventKind::Put => store.upsert(event.key, event.value),
            EventKind::Delete => match store.delete(&event.key) {
                Ok(()) => {}
                Err(LedgerError::KeyNotFound) => result.deletes_skipped += 1,
                Err(e) => return Err(e),
            },
        }
        result.events_replayed += 1;
        result.last_sequence = event.sequence;
    }

    // The scanner reports its error before closing the event stream, so
    // this either yields that error or sees a clean disconnect.
    if let Ok(err) = errors.recv() {
        return Err(err);
    }

    Ok(result)
}

/// Open the log, replay it into `store`, then start the background writer.
///
/// Fails without starting anything if the medium cannot be opened or the
/// replay hits a bad record.
pub fn initialize(
    store: &KvStore,
    config: &Config,
) -> Result<(Box<dyn TransactionLog>, RecoveryResult)> {
    config.validate()?;

    let log = open_log(config)?;
    let result = replay_into(log.as_ref(), store)?;

    if result.events_replayed > 0 {
        tracing::info!(
            events = result.events_replayed,
            deletes_skipped = result.deletes_skipped,
            last_sequence = result.last_sequence,
            "Transaction log replayed"
        );
    }

    log.start()?;
    Ok((log, result))
}
