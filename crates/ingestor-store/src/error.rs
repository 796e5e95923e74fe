//! Database error types and the `.map_db_err()` ergonomics used throughout [`crate::repository`].

use thiserror::Error;
use uuid::Uuid;

/// Identifies which store operation produced a [`DatabaseError`], for logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseOperation {
    Enqueue,
    ClaimNext,
    GetDocumentsForJob { job_id: Uuid },
    SetJobStatus { job_id: Uuid },
    SetDocumentStructuredStatus { document_id: Uuid },
    FailWithRetry { job_id: Uuid },
    InsertChunks { document_id: Uuid },
    DeleteDocumentChunks { document_id: Uuid },
    InsertEmbedding { chunk_id: Uuid },
    GetJobWithDocuments { job_id: Uuid },
    ReaperSweep,
    Query { description: String },
    Ping,
}

impl std::fmt::Display for DatabaseOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enqueue => write!(f, "enqueue"),
            Self::ClaimNext => write!(f, "claim_next"),
            Self::GetDocumentsForJob { job_id } => write!(f, "get_documents_for_job({job_id})"),
            Self::SetJobStatus { job_id } => write!(f, "set_job_status({job_id})"),
            Self::SetDocumentStructuredStatus { document_id } => {
                write!(f, "set_document_structured_status({document_id})")
            }
            Self::FailWithRetry { job_id } => write!(f, "fail_with_retry({job_id})"),
            Self::InsertChunks { document_id } => write!(f, "insert_chunks({document_id})"),
            Self::DeleteDocumentChunks { document_id } => {
                write!(f, "delete_document_chunks({document_id})")
            }
            Self::InsertEmbedding { chunk_id } => write!(f, "insert_embedding({chunk_id})"),
            Self::GetJobWithDocuments { job_id } => write!(f, "get_job_with_documents({job_id})"),
            Self::ReaperSweep => write!(f, "reaper_sweep"),
            Self::Query { description } => write!(f, "{description}"),
            Self::Ping => write!(f, "ping"),
        }
    }
}

/// Errors surfaced by the store layer.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("operation {operation} failed: {source}")]
    Query {
        operation: DatabaseOperation,
        #[source]
        source: sqlx::Error,
        correlation_id: Option<String>,
    },

    #[error("database is starting up, retry: {operation}")]
    TransientUnavailable {
        operation: DatabaseOperation,
        correlation_id: Option<String>,
    },

    #[error("unexpected state during {operation}: {message}")]
    UnexpectedState {
        operation: DatabaseOperation,
        message: String,
        correlation_id: Option<String>,
    },

    #[error("data integrity violation during {operation}: {message}")]
    DataIntegrityError {
        operation: DatabaseOperation,
        message: String,
        correlation_id: Option<String>,
    },

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Recognizes the Postgres "starting up" condition (SQL state `57P03`) so the worker loop
/// can distinguish transient infrastructure errors from real failures (see `ingestor-worker`).
fn is_transient(source: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = source
        && db_err.code().as_deref() == Some("57P03")
    {
        return true;
    }
    matches!(source, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
        || source
            .to_string()
            .to_lowercase()
            .contains("database system is starting up")
}

/// Extension trait adapting raw [`sqlx::Result`]s to [`DatabaseResult`], attaching the
/// operation and correlation id that produced them.
pub trait DatabaseErrorExt<T> {
    fn map_db_err(
        self,
        operation: DatabaseOperation,
        correlation_id: Option<String>,
    ) -> DatabaseResult<T>;
}

impl<T> DatabaseErrorExt<T> for Result<T, sqlx::Error> {
    fn map_db_err(
        self,
        operation: DatabaseOperation,
        correlation_id: Option<String>,
    ) -> DatabaseResult<T> {
        self.map_err(|source| {
            if is_transient(&source) {
                DatabaseError::TransientUnavailable {
                    operation,
                    correlation_id,
                }
            } else {
                DatabaseError::Query {
                    operation,
                    source,
                    correlation_id,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_display_includes_identifiers() {
        let job_id = Uuid::new_v4();
        let op = DatabaseOperation::SetJobStatus { job_id };
        assert!(op.to_string().contains(&job_id.to_string()));
    }
}
