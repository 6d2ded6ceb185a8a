//! Proxy error types.

use thiserror::Error;

/// Errors raised while setting up or running the proxy listener.
///
/// Per-request backend failures never surface here; they become 500
/// responses.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid backend address {0:?}")]
    InvalidBackend(String),

    #[error("invalid readiness probe header {0:?}")]
    InvalidProbeHeader(String),

    #[error("failed to bind proxy listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),
}

pub type ProxyResult<T> = Result<T, ProxyError>;
