//! Error types for lrubloom

use thiserror::Error;

/// Result type alias for lrubloom construction
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced when building a cache.
///
/// Operations on a constructed cache are infallible.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid combination of options
    #[error("configuration error: {0}")]
    Configuration(String),
}
