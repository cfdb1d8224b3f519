//! Error types for `ocspgen` core library.

use thiserror::Error;

/// Result type alias using `ocspgen` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `ocspgen` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
