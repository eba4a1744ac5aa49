//! Store Module
//!
//! In-memory key-value map; the system of record for reads.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Hand out copies, never references into the map
//!
//! ## Data Structure Choice
//! HashMap wrapped in a parking_lot RwLock:
//! - No ordering requirement (nothing is flushed in key order)
//! - The lock is held for exactly one map operation
//! - The map is rebuilt from the transaction log on every startup

mod table;

pub use table::KvStore;
