//! Core error model.

use thiserror::Error;

/// Result type used by core primitives.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error for core primitive operations.
///
/// Keep this focused on deterministic failures of the primitives themselves;
/// processing and storage concerns carry their own error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
