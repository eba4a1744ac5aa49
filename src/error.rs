//! Error types for LedgerKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Unified error type for LedgerKV operations
#[derive(Debug, Error)]
pub enum LedgerError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("no such key")]
    KeyNotFound,

    #[error("Invalid key or value: {0}")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Transaction Log Errors
    // -------------------------------------------------------------------------
    /// The background writer could not persist an event. Only ever
    /// delivered on the log's error stream.
    #[error("Durable write failed: {0}")]
    DurableWrite(String),

    #[error("Transaction log corrupted at line {line}: {reason}")]
    ReplayCorruption { line: u64, reason: String },

    #[error("Transaction log medium unavailable: {0}")]
    MediumUnavailable(String),

    /// Lifecycle misuse: start twice, replay after start, write while stopped
    #[error("Transaction log state error: {0}")]
    LogState(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),
}

/// Coarse classification used at the HTTP boundary and in tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidRequest,
    DurableWriteFailure,
    ReplayCorruption,
    MediumUnavailable,
    Internal,
}

impl LedgerError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::KeyNotFound => ErrorKind::NotFound,
            LedgerError::InvalidKey(_) => ErrorKind::InvalidRequest,
            LedgerError::DurableWrite(_) => ErrorKind::DurableWriteFailure,
            LedgerError::ReplayCorruption { .. } => ErrorKind::ReplayCorruption,
            LedgerError::MediumUnavailable(_) => ErrorKind::MediumUnavailable,
            _ => ErrorKind::Internal,
        }
    }

    /// Shorthand for replay corruption at a 1-based line number
    pub(crate) fn corrupt(line: u64, reason: impl Into<String>) -> Self {
        LedgerError::ReplayCorruption {
            line,
            reason: reason.into(),
        }
    }
}
