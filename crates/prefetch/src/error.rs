//! Error types for the prefetch engine
//!
//! Configuration errors surface at construction, path errors at first
//! resolution attempt, and data-source failures pass through unchanged.

use thiserror::Error;

use crate::source::DataSourceError;

/// Result type alias for prefetch operations
pub type PrefetchResult<T> = Result<T, PrefetchError>;

/// Error types for prefetch operations
#[derive(Error, Debug)]
pub enum PrefetchError {
    /// Invalid relation spec or engine configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A path names a field the record shape does not have
    #[error("unknown field '{field}' in path '{path}'")]
    UnknownField { field: String, path: String },

    /// A path could not be evaluated against a record at runtime
    #[error("cannot resolve path '{path}': {context}")]
    Resolution { path: String, context: String },

    /// Opaque failure from the external read capability
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}
