//! Error types for structuring and embedding provider calls.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors thrown by a [`crate::traits::Structurer`] or [`crate::traits::Embedder`]
/// implementation. These are the "unknown exceptions" that a Processor routes to
/// `failWithRetry`; the `unsupported`/`failed` structuring outcomes are ordinary
/// return values, not errors (see `StructureResult`).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("unknown provider id: {0}")]
    UnknownProvider(String),

    #[error("provider {provider}/{model} configuration invalid: {message}")]
    Configuration {
        provider: String,
        model: String,
        message: String,
    },

    #[error("provider {provider}/{model} transport error: {source}")]
    Transport {
        provider: String,
        model: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider {provider}/{model} returned an error response: {message}")]
    ErrorResponse {
        provider: String,
        model: String,
        message: String,
    },

    #[error("provider {provider}/{model} returned a malformed response: {message}")]
    MalformedResponse {
        provider: String,
        model: String,
        message: String,
    },

    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        Self::MalformedResponse {
            provider: "unknown".to_string(),
            model: "unknown".to_string(),
            message: err.to_string(),
        }
    }
}
