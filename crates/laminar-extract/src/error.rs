//! Extraction error types.
//!
//! [`ExtractError`] is the single error type for routing, cursor binding
//! and the collaborator boundaries. Errors raised inside an execution
//! engine travel through the merged message stream as `Err` items and
//! reach the caller untouched.

use thiserror::Error;

/// Errors that can occur while planning or executing an extraction job.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A catalog entry references a stream that was never declared.
    ///
    /// Only raised under [`UnknownStreamPolicy::Fail`](crate::config::UnknownStreamPolicy::Fail).
    #[error("unknown stream in catalog: '{name}'")]
    UnknownStream {
        /// Name referenced by the catalog entry.
        name: String,
    },

    /// Invalid source or router configuration.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Required configuration key is missing.
    #[error("missing required config: {0}")]
    MissingConfig(String),

    /// The declared-stream provider failed to produce its streams.
    #[error("stream discovery failed: {0}")]
    Discovery(String),

    /// A failure reported by the concurrent or sequential engine.
    #[error("engine error: {0}")]
    Engine(String),

    /// Incoming job state could not be interpreted.
    #[error("state error: {0}")]
    StateError(String),

    /// JSON encoding or decoding error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
