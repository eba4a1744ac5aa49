//! Configuration for LedgerKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// Main configuration for a LedgerKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the durable medium
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── transaction.log   (file backend)
    ///     └── transactions.db   (sqlite backend)
    pub data_dir: PathBuf,

    /// Which durable medium backs the transaction log
    pub log_backend: LogBackend,

    // -------------------------------------------------------------------------
    // Transaction Log Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the log file
    pub wal_sync_strategy: WalSyncStrategy,

    /// Capacity of the pending-event queue; writers block when it is full
    pub queue_capacity: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address
    pub listen_addr: String,
}

/// Durable medium for the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBackend {
    /// Tab-separated append-only text file
    File,

    /// `transactions` table in a SQLite database
    Sqlite,
}

impl FromStr for LogBackend {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(LogBackend::File),
            "sqlite" => Ok(LogBackend::Sqlite),
            other => Err(LedgerError::Config(format!(
                "unknown log backend '{}' (expected 'file' or 'sqlite')",
                other
            ))),
        }
    }
}

/// Log sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./ledgerkv_data"),
            log_backend: LogBackend::File,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            queue_capacity: 16,
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Config {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const LOG_FILENAME: &'static str = "transaction.log";
    const SQLITE_FILENAME: &'static str = "transactions.db";

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the durable medium for the configured backend
    pub fn log_path(&self) -> PathBuf {
        match self.log_backend {
            LogBackend::File => self.data_dir.join(Self::LOG_FILENAME),
            LogBackend::Sqlite => self.data_dir.join(Self::SQLITE_FILENAME),
        }
    }

    /// Reject settings the log cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(LedgerError::Config(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(LedgerError::Config(
                "sync count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for the durable medium)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the log backend
    pub fn log_backend(mut self, backend: LogBackend) -> Self {
        self.config.log_backend = backend;
        self
    }

    /// Set the log sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the pending-event queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
