//! Store trait for dependency injection and testing.

use async_trait::async_trait;
use ingestor_config::WorkerConfig;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{
    ChunkEmbedding, DocumentChunk, DocumentStatus, IngestionJob, JobStatus, PersistedChunk,
    StagedDocument, UploadedDocument,
};

/// All persistence operations needed by the Enqueue, Queue, and Processor components.
#[async_trait]
pub trait Store: Send + Sync {
    /// Side-effect-free readiness probe (`SELECT 1` against the write pool). Used by
    /// the worker's startup wait loop instead of a real queue operation, so a job
    /// sitting eligible at boot is never claimed and silently discarded.
    async fn ping(&self) -> DatabaseResult<()>;

    /// Creates one job row and one document row per input, in a single transaction.
    async fn enqueue(
        &self,
        user_id: &str,
        upload_session_id: &str,
        documents: Vec<StagedDocument>,
    ) -> DatabaseResult<Uuid>;

    /// Atomically claims the oldest eligible queued job, transitioning it to
    /// `processing_structure` and incrementing `attempt_count`. Returns `None` if
    /// no job is eligible or another worker won the race.
    async fn claim_next(&self) -> DatabaseResult<Option<IngestionJob>>;

    /// Returns all documents for a job, ordered by `created_at` ascending.
    async fn get_documents_for_job(&self, job_id: Uuid) -> DatabaseResult<Vec<UploadedDocument>>;

    /// Unconditional job status write.
    async fn set_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> DatabaseResult<()>;

    /// Unconditional document status write.
    async fn set_document_structured_status(
        &self,
        document_id: Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> DatabaseResult<()>;

    /// Requeues a job for another attempt, or marks it failed once attempts are exhausted.
    /// Backoff for the next attempt comes from `worker_config.backoff_for_attempt`, keyed
    /// on the job's current `attempt_count`. A no-op if the job no longer exists.
    async fn fail_with_retry(
        &self,
        job_id: Uuid,
        error_message: &str,
        worker_config: &WorkerConfig,
    ) -> DatabaseResult<()>;

    /// Assigns dense sequential `chunk_index` values starting at 0, drops empty-after-trim
    /// entries, and inserts the rest. Empty input is a no-op returning an empty vector.
    async fn insert_chunks(
        &self,
        document_id: Uuid,
        texts: Vec<(String, Option<serde_json::Value>)>,
    ) -> DatabaseResult<Vec<PersistedChunk>>;

    /// Deletes every chunk (and cascading embedding) belonging to a document. Used to
    /// clear partial state before reprocessing a crash-interrupted document from scratch.
    async fn delete_document_chunks(&self, document_id: Uuid) -> DatabaseResult<()>;

    /// Returns the chunks currently persisted for a document, ordered by `chunk_index`.
    async fn get_document_chunks(&self, document_id: Uuid) -> DatabaseResult<Vec<DocumentChunk>>;

    /// Inserts one embedding row for a chunk under the given model.
    async fn insert_embedding(
        &self,
        chunk_id: Uuid,
        embedding_model: &str,
        embedding_dim: i32,
        embedding: &[f64],
    ) -> DatabaseResult<()>;

    /// Returns `true` once every chunk of a document has an embedding row for the given model.
    async fn document_fully_embedded(
        &self,
        document_id: Uuid,
        embedding_model: &str,
    ) -> DatabaseResult<bool>;

    /// Status boundary: fetches a job and its documents, scoped to the owning user.
    async fn get_job_with_documents(
        &self,
        job_id: Uuid,
        user_id: &str,
    ) -> DatabaseResult<Option<(IngestionJob, Vec<UploadedDocument>)>>;

    /// Rewrites non-terminal jobs stuck past the staleness threshold back to `queued`,
    /// without touching `attempt_count`. Returns the number of jobs recovered.
    async fn recover_stale_claims(&self, stale_after_ms: i64) -> DatabaseResult<u64>;

    /// Returns every embedding row for a document's chunks, ordered by `chunk_index`.
    async fn get_chunk_embeddings(&self, document_id: Uuid) -> DatabaseResult<Vec<ChunkEmbedding>>;
}
