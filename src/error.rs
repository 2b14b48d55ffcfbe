//! Error types for lazy field and reader operations.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by cells, field caches, readers and loaders.
///
/// A failure is always reported through one of these variants, never as an
/// empty or default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Primary retrieval found no record for the identifier.
    NotFound(String),

    /// The first page fetch of a reader failed, so no reader exists.
    RetrievalError(String),

    /// A page or field fetch failed (network, auth, malformed response).
    FetchError(String),

    /// A compute closure rejected its upstream data.
    ComputeError(String),

    /// A field was read or stored before being declared.
    UndeclaredField(String),

    /// A field was accessed with a value type other than the declared one.
    FieldTypeMismatch(String),

    /// Invalid configuration value.
    ConfigError(String),
}

impl Error {
    /// Short machine-friendly label, used by metrics sinks.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::RetrievalError(_) => "retrieval",
            Error::FetchError(_) => "fetch",
            Error::ComputeError(_) => "compute",
            Error::UndeclaredField(_) => "undeclared_field",
            Error::FieldTypeMismatch(_) => "field_type_mismatch",
            Error::ConfigError(_) => "config",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::RetrievalError(msg) => write!(f, "Retrieval error: {}", msg),
            Error::FetchError(msg) => write!(f, "Fetch error: {}", msg),
            Error::ComputeError(msg) => write!(f, "Compute error: {}", msg),
            Error::UndeclaredField(name) => write!(f, "Undeclared lazy field: {}", name),
            Error::FieldTypeMismatch(msg) => write!(f, "Field type mismatch: {}", msg),
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::FetchError(format!("Malformed payload: {}", e))
    }
}
