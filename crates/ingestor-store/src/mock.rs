//! In-memory [`Store`] for unit tests, with error-injection hooks.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use ingestor_config::WorkerConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{DatabaseError, DatabaseOperation, DatabaseResult};
use crate::models::{
    ChunkEmbedding, DocumentChunk, DocumentStatus, IngestionJob, JobStatus, PersistedChunk,
    StagedDocument, UploadedDocument,
};
use crate::traits::Store;

type JobMap = Arc<Mutex<HashMap<Uuid, IngestionJob>>>;
type DocumentMap = Arc<Mutex<HashMap<Uuid, UploadedDocument>>>;
type ChunkMap = Arc<Mutex<HashMap<Uuid, DocumentChunk>>>;
type EmbeddingMap = Arc<Mutex<HashMap<(Uuid, String), ChunkEmbedding>>>;

/// In-memory stand-in for [`crate::repository::PgStore`], used by `ingestor-worker`'s
/// Processor/worker-loop tests. Call [`MockStore::fail_next`] to make the next operation
/// return an error, mirroring a real transient failure.
#[derive(Clone, Default)]
pub struct MockStore {
    jobs: JobMap,
    documents: DocumentMap,
    chunks: ChunkMap,
    embeddings: EmbeddingMap,
    next_failure: Arc<Mutex<Option<String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arranges for the next store call to fail with `message`.
    pub fn fail_next(&self, message: &str) {
        *self.next_failure.lock().unwrap() = Some(message.to_string());
    }

    fn check_fail(&self, operation: DatabaseOperation) -> DatabaseResult<()> {
        if let Some(message) = self.next_failure.lock().unwrap().take() {
            return Err(DatabaseError::UnexpectedState {
                operation,
                message,
                correlation_id: None,
            });
        }
        Ok(())
    }

    /// Seeds a job directly, bypassing `enqueue`, for tests that want to start from a
    /// specific state (e.g. an exhausted-retry job).
    pub fn seed_job(&self, job: IngestionJob) {
        self.jobs.lock().unwrap().insert(job.job_id, job);
    }

    pub fn seed_document(&self, document: UploadedDocument) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.document_id, document);
    }
}

#[async_trait]
impl Store for MockStore {
    async fn ping(&self) -> DatabaseResult<()> {
        self.check_fail(DatabaseOperation::Ping)
    }

    async fn enqueue(
        &self,
        user_id: &str,
        upload_session_id: &str,
        documents: Vec<StagedDocument>,
    ) -> DatabaseResult<Uuid> {
        self.check_fail(DatabaseOperation::Enqueue)?;

        let job_id = Uuid::new_v4();
        let now = Utc::now();
        self.jobs.lock().unwrap().insert(
            job_id,
            IngestionJob {
                job_id,
                user_id: user_id.to_string(),
                upload_session_id: upload_session_id.to_string(),
                status: JobStatus::Queued,
                attempt_count: 0,
                max_attempts: 3,
                next_run_at: now,
                error: None,
                created_at: now,
                updated_at: now,
            },
        );

        let mut docs = self.documents.lock().unwrap();
        for document in documents {
            let document_id = Uuid::new_v4();
            docs.insert(
                document_id,
                UploadedDocument {
                    document_id,
                    job_id,
                    user_id: user_id.to_string(),
                    original_name: document.original_name,
                    stored_name: document.stored_name,
                    stored_path: document.stored_path,
                    mime_type: document.mime_type,
                    size_bytes: document.size_bytes,
                    structured_status: DocumentStatus::Pending,
                    error: None,
                    created_at: now,
                    updated_at: now,
                },
            );
        }

        Ok(job_id)
    }

    async fn claim_next(&self) -> DatabaseResult<Option<IngestionJob>> {
        self.check_fail(DatabaseOperation::ClaimNext)?;

        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let mut candidates: Vec<&mut IngestionJob> = jobs
            .values_mut()
            .filter(|job| {
                job.status == JobStatus::Queued
                    && job.next_run_at <= now
                    && job.attempt_count < job.max_attempts
            })
            .collect();
        candidates.sort_by_key(|job| job.created_at);

        let Some(job) = candidates.into_iter().next() else {
            return Ok(None);
        };

        job.status = JobStatus::ProcessingStructure;
        job.attempt_count += 1;
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn get_documents_for_job(&self, job_id: Uuid) -> DatabaseResult<Vec<UploadedDocument>> {
        self.check_fail(DatabaseOperation::GetDocumentsForJob { job_id })?;

        let mut docs: Vec<UploadedDocument> = self
            .documents
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.job_id == job_id)
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.created_at);
        Ok(docs)
    }

    async fn set_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> DatabaseResult<()> {
        self.check_fail(DatabaseOperation::SetJobStatus { job_id })?;

        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.status = status;
            job.error = error.map(str::to_string);
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_document_structured_status(
        &self,
        document_id: Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> DatabaseResult<()> {
        self.check_fail(DatabaseOperation::SetDocumentStructuredStatus { document_id })?;

        if let Some(document) = self.documents.lock().unwrap().get_mut(&document_id) {
            document.structured_status = status;
            document.error = error.map(str::to_string);
            document.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn fail_with_retry(
        &self,
        job_id: Uuid,
        error_message: &str,
        worker_config: &WorkerConfig,
    ) -> DatabaseResult<()> {
        self.check_fail(DatabaseOperation::FailWithRetry { job_id })?;

        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(&job_id) else {
            return Ok(());
        };

        if job.attempt_count >= job.max_attempts {
            job.status = JobStatus::Failed;
            job.error = Some(error_message.to_string());
        } else {
            let attempt_count_u32 = u32::try_from(job.attempt_count.max(0)).unwrap_or(u32::MAX);
            let backoff = worker_config.backoff_for_attempt(attempt_count_u32);
            let backoff_ms = i64::try_from(backoff.as_millis()).unwrap_or(i64::MAX);
            job.status = JobStatus::Queued;
            job.error = Some(error_message.to_string());
            job.next_run_at = Utc::now() + ChronoDuration::milliseconds(backoff_ms);
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_chunks(
        &self,
        document_id: Uuid,
        texts: Vec<(String, Option<serde_json::Value>)>,
    ) -> DatabaseResult<Vec<PersistedChunk>> {
        self.check_fail(DatabaseOperation::InsertChunks { document_id })?;

        let mut chunks = self.chunks.lock().unwrap();
        let mut existing_max = chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .map(|c| c.chunk_index)
            .max();

        let mut persisted = Vec::new();
        for (text, metadata) in texts {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let chunk_index = existing_max.map_or(0, |m| m + 1);
            existing_max = Some(chunk_index);

            let chunk_id = Uuid::new_v4();
            chunks.insert(
                chunk_id,
                DocumentChunk {
                    chunk_id,
                    document_id,
                    chunk_index,
                    text: trimmed.to_string(),
                    metadata,
                    created_at: Utc::now(),
                },
            );
            persisted.push(PersistedChunk {
                chunk_id,
                chunk_index,
                text: trimmed.to_string(),
            });
        }
        Ok(persisted)
    }

    async fn delete_document_chunks(&self, document_id: Uuid) -> DatabaseResult<()> {
        self.check_fail(DatabaseOperation::DeleteDocumentChunks { document_id })?;

        let mut chunks = self.chunks.lock().unwrap();
        let removed_ids: std::collections::HashSet<Uuid> = chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .map(|c| c.chunk_id)
            .collect();
        chunks.retain(|_, chunk| chunk.document_id != document_id);
        drop(chunks);

        self.embeddings
            .lock()
            .unwrap()
            .retain(|(chunk_id, _), _| !removed_ids.contains(chunk_id));
        Ok(())
    }

    async fn get_document_chunks(&self, document_id: Uuid) -> DatabaseResult<Vec<DocumentChunk>> {
        self.check_fail(DatabaseOperation::Query {
            description: "get_document_chunks".to_string(),
        })?;

        let mut chunks: Vec<DocumentChunk> = self
            .chunks
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn insert_embedding(
        &self,
        chunk_id: Uuid,
        embedding_model: &str,
        embedding_dim: i32,
        embedding: &[f64],
    ) -> DatabaseResult<()> {
        self.check_fail(DatabaseOperation::InsertEmbedding { chunk_id })?;

        self.embeddings.lock().unwrap().insert(
            (chunk_id, embedding_model.to_string()),
            ChunkEmbedding {
                embedding_id: Uuid::new_v4(),
                chunk_id,
                embedding_model: embedding_model.to_string(),
                embedding_dim,
                embedding: serde_json::json!(embedding),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn document_fully_embedded(
        &self,
        document_id: Uuid,
        embedding_model: &str,
    ) -> DatabaseResult<bool> {
        self.check_fail(DatabaseOperation::Query {
            description: "document_fully_embedded".to_string(),
        })?;

        let chunks = self.chunks.lock().unwrap();
        let embeddings = self.embeddings.lock().unwrap();
        let document_chunks: Vec<&DocumentChunk> = chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .collect();
        Ok(document_chunks
            .iter()
            .all(|c| embeddings.contains_key(&(c.chunk_id, embedding_model.to_string()))))
    }

    async fn get_job_with_documents(
        &self,
        job_id: Uuid,
        user_id: &str,
    ) -> DatabaseResult<Option<(IngestionJob, Vec<UploadedDocument>)>> {
        self.check_fail(DatabaseOperation::GetJobWithDocuments { job_id })?;

        let job = self.jobs.lock().unwrap().get(&job_id).cloned();
        let Some(job) = job.filter(|j| j.user_id == user_id) else {
            return Ok(None);
        };
        let documents = self.get_documents_for_job(job_id).await?;
        Ok(Some((job, documents)))
    }

    async fn recover_stale_claims(&self, stale_after_ms: i64) -> DatabaseResult<u64> {
        self.check_fail(DatabaseOperation::ReaperSweep)?;

        let cutoff = Utc::now() - ChronoDuration::milliseconds(stale_after_ms);
        let mut recovered = 0u64;
        for job in self.jobs.lock().unwrap().values_mut() {
            let stuck = matches!(
                job.status,
                JobStatus::ProcessingStructure | JobStatus::ProcessingEmbeddings
            );
            if stuck && job.updated_at < cutoff {
                job.status = JobStatus::Queued;
                job.next_run_at = Utc::now();
                job.updated_at = Utc::now();
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn get_chunk_embeddings(&self, document_id: Uuid) -> DatabaseResult<Vec<ChunkEmbedding>> {
        self.check_fail(DatabaseOperation::Query {
            description: "get_chunk_embeddings".to_string(),
        })?;

        let mut chunks: Vec<DocumentChunk> = self
            .chunks
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);

        let embeddings = self.embeddings.lock().unwrap();
        Ok(chunks
            .iter()
            .flat_map(|chunk| {
                embeddings
                    .iter()
                    .filter(|((chunk_id, _), _)| *chunk_id == chunk.chunk_id)
                    .map(|(_, embedding)| embedding.clone())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_claim_transitions_status() {
        let store = MockStore::new();
        let job_id = store
            .enqueue("user-1", "session-1", vec![])
            .await
            .unwrap();

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.job_id, job_id);
        assert_eq!(claimed.status, JobStatus::ProcessingStructure);
        assert_eq!(claimed.attempt_count, 1);

        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_next_injects_error_once() {
        let store = MockStore::new();
        store.fail_next("boom");
        assert!(store.claim_next().await.is_err());
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_with_retry_exhausts_into_failed() {
        let store = MockStore::new();
        let job_id = store
            .enqueue("user-1", "session-1", vec![])
            .await
            .unwrap();

        for _ in 0..3 {
            let job = store.claim_next().await.unwrap();
            if job.is_none() {
                store
                    .jobs
                    .lock()
                    .unwrap()
                    .get_mut(&job_id)
                    .unwrap()
                    .next_run_at = Utc::now();
                continue;
            }
            store
                .fail_with_retry(job_id, "transient", &WorkerConfig::from_env())
                .await
                .unwrap();
        }

        let job = store.jobs.lock().unwrap().get(&job_id).unwrap().clone();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 3);
    }

    #[tokio::test]
    async fn insert_chunks_assigns_dense_indices() {
        let store = MockStore::new();
        let document_id = Uuid::new_v4();
        let persisted = store
            .insert_chunks(
                document_id,
                vec![
                    ("  first  ".to_string(), None),
                    (String::new(), None),
                    ("second".to_string(), None),
                ],
            )
            .await
            .unwrap();

        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].chunk_index, 0);
        assert_eq!(persisted[1].chunk_index, 1);
        assert_eq!(persisted[0].text, "first");
    }

    #[tokio::test]
    async fn recover_stale_claims_requeues_jobs_stuck_past_cutoff() {
        let store = MockStore::new();
        let job_id = Uuid::new_v4();
        let mut job = IngestionJob {
            job_id,
            user_id: "user-1".to_string(),
            upload_session_id: "session-1".to_string(),
            status: JobStatus::ProcessingStructure,
            attempt_count: 1,
            max_attempts: 3,
            next_run_at: Utc::now(),
            error: None,
            created_at: Utc::now() - ChronoDuration::minutes(10),
            updated_at: Utc::now() - ChronoDuration::minutes(10),
        };
        store.seed_job(job.clone());
        store.seed_document(UploadedDocument {
            document_id: Uuid::new_v4(),
            job_id,
            user_id: "user-1".to_string(),
            original_name: "doc.csv".to_string(),
            stored_name: "doc.csv".to_string(),
            stored_path: "doc.csv".to_string(),
            mime_type: "text/csv".to_string(),
            size_bytes: 4,
            structured_status: DocumentStatus::Processing,
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });

        let recovered = store.recover_stale_claims(60_000).await.unwrap();
        assert_eq!(recovered, 1);

        job = store.jobs.lock().unwrap().get(&job_id).unwrap().clone();
        assert_eq!(job.status, JobStatus::Queued);
    }
}
