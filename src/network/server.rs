//! HTTP Server
//!
//! Binds the listener and serves the router until shutdown.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::error::{LedgerError, Result};

use super::{create_router, SharedEngine};

/// HTTP server for LedgerKV
pub struct Server {
    engine: SharedEngine,
    listener: TcpListener,
}

impl Server {
    /// Bind to `addr` ("host:port"; port 0 picks a free one)
    pub async fn bind(addr: &str, engine: SharedEngine) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LedgerError::Network(format!("cannot bind {}: {}", addr, e)))?;
        Ok(Self { engine, listener })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    ///
    /// Does not close the engine; the caller drains the log afterwards.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Serving on {}", self.local_addr()?);

        axum::serve(self.listener, create_router(self.engine))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| LedgerError::Network(e.to_string()))
    }
}
