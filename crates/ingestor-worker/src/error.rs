//! Error types for the worker loop and job processor.

use ingestor_common::{CommonError, impl_common_conversions};
use ingestor_providers::ProviderError;
use ingestor_store::DatabaseError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl CommonError for WorkerError {
    fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    fn config_error(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    fn parse_error(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    fn other_error(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl_common_conversions!(WorkerError);

impl WorkerError {
    /// Whether this error should be treated as a pre-claim transient condition
    /// (never consumes a job's `attemptCount`): database-starting-up and
    /// connection-refused conditions surfaced from `claimNext` itself, before a
    /// job was claimed.
    #[must_use]
    pub fn is_transient_infra(&self) -> bool {
        matches!(self, Self::Store(DatabaseError::TransientUnavailable { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_via_common_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "upload root missing");
        let err: WorkerError = io_err.into();
        assert!(matches!(err, WorkerError::Io(_)));
    }

    #[test]
    fn anyhow_errors_convert_to_other() {
        let err: WorkerError = anyhow::anyhow!("unexpected bootstrap failure").into();
        assert!(matches!(err, WorkerError::Other(_)));
    }
}
