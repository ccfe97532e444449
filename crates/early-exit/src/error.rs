//! Error types for early-exit routing.

use thiserror::Error;

/// Result type alias for early-exit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for early-exit routing.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown measure key, or no threshold family configured.
    #[error("configuration error: {0}")]
    Config(String),

    /// Mask and tensor shapes cannot be reconciled, or the rank is unsupported.
    #[error("shape error: {0}")]
    Shape(String),

    /// A restore index is out of range or not a permutation.
    #[error("index error: {0}")]
    Index(String),

    /// An input required by the selected measure was not supplied.
    #[error("missing required input: {0}")]
    Precondition(&'static str),

    /// A stateful classifier saw input that does not match its carried state.
    ///
    /// The recurrent measure resets the classifier and retries once on this error.
    #[error("classifier state mismatch: {0}")]
    TransientState(String),

    /// A tensor backend reported a failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Candle tensor operation error.
    #[cfg(feature = "candle")]
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
