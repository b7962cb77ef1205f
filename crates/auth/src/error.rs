//! Plugin lifecycle errors.

use thiserror::Error;

/// Errors raised while constructing, running or stopping a plugin.
///
/// Authorization *decisions* are not errors; they travel as
/// [`tonic::Status`] values from `authorize` and are translated to HTTP
/// by the server.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{0}")]
    Config(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
