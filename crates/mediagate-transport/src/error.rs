use std::net::SocketAddr;
use thiserror::Error;

/// Transport-level failures.
///
/// Per-invocation problems never show up here; they travel back to the
/// caller inside an `InvocationResult`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error: {0}")]
    Serve(String),
}
