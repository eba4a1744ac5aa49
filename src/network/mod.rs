//! Network Module
//!
//! HTTP front end over the engine.
//!
//! ## Architecture
//! - Axum router on the tokio multi-thread runtime (one task per request)
//! - Reads go straight to the store
//! - Mutations run on the blocking pool, since enqueueing to the log may
//!   block while the pending queue is full
//!
//! ## Routes
//! ```text
//! GET    /v1/key          all pairs as a JSON object
//! GET    /v1/key/{key}    value as text            404 if absent
//! PUT    /v1/key/{key}    body is the value        201
//! DELETE /v1/key/{key}                             404 if absent
//! GET    /health          status, last_sequence, write_failures
//! ```

mod response;
mod routes;
mod server;

pub use response::ApiError;
pub use routes::{create_router, SharedEngine};
pub use server::Server;
