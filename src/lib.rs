//! # LedgerKV
//!
//! A single-node key-value store served over HTTP, with:
//! - An in-memory map as the system of record for reads
//! - A transaction log (append-only file or SQLite table) for durability
//! - Crash recovery by replaying the log on startup
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Server                             │
//! │                (one task per request)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │          (mutate store, then enqueue event)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   KvStore   │          │ Pending     │
//!   │  (RwLock)   │          │ queue (FIFO)│
//!   └─────────────┘          └──────┬──────┘
//!                                   │  single writer thread
//!                                   ▼
//!                           ┌─────────────┐     ┌──────────────┐
//!                           │ File / SQL  │ ──► │ error stream │
//!                           │   medium    │     └──────────────┘
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod txlog;
pub mod store;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LedgerError, Result};
pub use config::Config;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of LedgerKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
