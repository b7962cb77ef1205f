//! Provider error taxonomy.

use thiserror::Error;

/// Errors returned by provider operations.
///
/// The first four variants are sentinels with fixed HTTP translations
/// (404, 403, 304 and 404 respectively); everything else is surfaced as
/// an internal error.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("resource not found")]
    NotFound,

    #[error("access denied")]
    Denied,

    /// The object has not been modified since the timestamp supplied in
    /// `GetOptions`. Translated into a 304 response with no body.
    #[error("resource not modified")]
    NotModified,

    #[error("presign not allowed for this provider")]
    NoPresign,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Wrap an arbitrary backend SDK error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Errors raised by the provider registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("provider id is required")]
    EmptyId,

    #[error("provider already registered")]
    AlreadyRegistered,

    #[error("auth plugin not found for provider {0}")]
    PluginNotFound(String),
}
