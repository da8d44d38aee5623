//! Error types for the echo service and its clients.

/// Main error type for the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration is missing, malformed or inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading a certificate, key or socket failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// What was being accessed.
        path: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// Connection-level failure: handshake, DNS, connect or bind.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The server answered with a non-OK status.
    #[error("RPC failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// The call deadline elapsed before a response arrived.
    #[error("Call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
