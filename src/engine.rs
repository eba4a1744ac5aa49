//! Engine Module
//!
//! The composed context handed to the request layer.
//!
//! ## Responsibilities
//! - Own the store and the transaction log
//! - Run recovery on open
//! - Apply mutations in memory, then enqueue them to the log
//! - Supervise the log's error stream
//! - Drain the log on close

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::store::KvStore;
use crate::txlog::{self, RecoveryResult, TransactionLog};

/// The main storage engine
///
/// ## Write path
/// `put`/`delete` mutate the store first and enqueue the event second.
/// The two steps are not atomic: a crash in between loses the event, and
/// concurrent writers to the same key may reach the log in a different
/// order than they reached the store.
///
/// ## Failure reporting
/// Background write failures never reach the caller. A supervisor thread
/// logs them and counts them in `write_failures`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// In-memory key-value map (internal RwLock)
    store: KvStore,

    /// Transaction log, already replayed and started
    log: Box<dyn TransactionLog>,

    /// Stats from the startup replay
    recovery: RecoveryResult,

    /// Background write failures seen so far
    write_failures: Arc<AtomicU64>,

    /// Drains the log's error stream
    supervisor: Mutex<Option<JoinHandle<()>>>,

    /// Cleared by `close`. Mutations hold the read side for their whole
    /// store-then-log sequence, so close never lands between the two.
    accepting: RwLock<bool>,
}

impl Engine {
    /// Open an engine with the given config
    ///
    /// On startup:
    /// 1. Open the durable medium
    /// 2. Replay it into a fresh store
    /// 3. Start the background writer
    /// 4. Start the error supervisor
    pub fn open(config: Config) -> Result<Self> {
        let store = KvStore::new();
        let (log, recovery) = txlog::initialize(&store, &config)?;

        let write_failures = Arc::new(AtomicU64::new(0));
        let supervisor = spawn_supervisor(log.as_ref(), Arc::clone(&write_failures))?;

        tracing::info!(
            keys = store.len(),
            last_sequence = log.last_sequence(),
            "Engine ready"
        );

        Ok(Self {
            config,
            store,
            log,
            recovery,
            write_failures,
            supervisor: Mutex::new(Some(supervisor)),
            accepting: RwLock::new(true),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Result<String> {
        self.store.get(key)
    }

    /// Snapshot of every pair
    pub fn get_all(&self) -> HashMap<String, String> {
        self.store.get_all()
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Refuse if the engine is closed
    /// 2. Check the log can record the pair
    /// 3. Write to the store
    /// 4. Enqueue a Put event (may block under backpressure)
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let accepting = self.accepting.read();
        ensure_accepting(*accepting)?;

        self.log.check(key, value)?;
        self.store.upsert(key, value);
        self.log.write_put(key, value)
    }

    /// Delete a key
    ///
    /// Fails with `KeyNotFound` before touching the log if the key is absent.
    pub fn delete(&self, key: &str) -> Result<()> {
        let accepting = self.accepting.read();
        ensure_accepting(*accepting)?;

        self.log.check(key, "")?;
        self.store.delete(key)?;
        self.log.write_delete(key)
    }

    /// Stop accepting writes, drain the log and stop the supervisor
    ///
    /// Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        // Waits for in-flight mutations to finish enqueueing
        *self.accepting.write() = false;

        let supervisor = self.supervisor.lock().take();
        self.log.close()?;

        // The writer has exited, so the error stream is closed and the
        // supervisor loop ends on its own.
        let Some(handle) = supervisor else {
            return Ok(());
        };
        let _ = handle.join();

        tracing::info!(
            last_sequence = self.log.last_sequence(),
            write_failures = self.write_failures(),
            "Engine closed"
        );
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Highest durable sequence
    pub fn last_sequence(&self) -> u64 {
        self.log.last_sequence()
    }

    /// Background write failures observed since open
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Stats from the startup replay
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Number of keys in the store
    pub fn key_count(&self) -> usize {
        self.store.len()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Engine close on drop failed");
        }
    }
}

fn ensure_accepting(accepting: bool) -> Result<()> {
    if accepting {
        Ok(())
    } else {
        Err(LedgerError::LogState("engine is closed".to_string()))
    }
}

fn spawn_supervisor(log: &dyn TransactionLog, failures: Arc<AtomicU64>) -> Result<JoinHandle<()>> {
    let errors = log.errors();
    let handle = thread::Builder::new()
        .name("txlog-supervisor".to_string())
        .spawn(move || {
            for err in errors.iter() {
                failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %err, "Transaction log write failed");
            }
        })?;
    Ok(handle)
}
