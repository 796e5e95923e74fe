//! `PostgreSQL`-backed implementation of [`crate::traits::Store`].

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use ingestor_config::WorkerConfig;
use sqlx::Row;
use uuid::Uuid;

use crate::error::{DatabaseErrorExt, DatabaseOperation, DatabaseResult};
use crate::models::{
    ChunkEmbedding, DocumentChunk, DocumentStatus, IngestionJob, JobStatus, PersistedChunk,
    StagedDocument, UploadedDocument,
};
use crate::pool_manager::PoolManager;
use crate::traits::Store;

/// Backs [`Store`] with two `PostgreSQL` connection pools (read/write).
#[derive(Clone)]
pub struct PgStore {
    pools: PoolManager,
}

impl PgStore {
    pub const fn new(pools: PoolManager) -> Self {
        Self { pools }
    }

    /// # Errors
    /// Returns an error if `DATABASE_URL` is unset/malformed or the pools fail to connect.
    pub async fn from_env() -> Result<Self, anyhow::Error> {
        let pools = PoolManager::from_env().await?;
        Ok(Self::new(pools))
    }
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> DatabaseResult<IngestionJob> {
    let status_raw: String = row.get("status");
    let status: JobStatus = status_raw
        .parse()
        .map_err(|message| into_integrity_error(DatabaseOperation::ClaimNext, message))?;
    Ok(IngestionJob {
        job_id: row.get("job_id"),
        user_id: row.get("user_id"),
        upload_session_id: row.get("upload_session_id"),
        status,
        attempt_count: row.get("attempt_count"),
        max_attempts: row.get("max_attempts"),
        next_run_at: row.get("next_run_at"),
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> DatabaseResult<UploadedDocument> {
    let status_raw: String = row.get("structured_status");
    let structured_status: DocumentStatus = status_raw.parse().map_err(|message| {
        into_integrity_error(
            DatabaseOperation::GetDocumentsForJob {
                job_id: row.get("job_id"),
            },
            message,
        )
    })?;
    Ok(UploadedDocument {
        document_id: row.get("document_id"),
        job_id: row.get("job_id"),
        user_id: row.get("user_id"),
        original_name: row.get("original_name"),
        stored_name: row.get("stored_name"),
        stored_path: row.get("stored_path"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        structured_status,
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn into_integrity_error(
    operation: DatabaseOperation,
    message: String,
) -> crate::error::DatabaseError {
    crate::error::DatabaseError::DataIntegrityError {
        operation,
        message,
        correlation_id: None,
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> DatabaseResult<()> {
        let pool = self.pools.write_pool();
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map_db_err(DatabaseOperation::Ping, None)?;
        Ok(())
    }

    async fn enqueue(
        &self,
        user_id: &str,
        upload_session_id: &str,
        documents: Vec<StagedDocument>,
    ) -> DatabaseResult<Uuid> {
        let pool = self.pools.write_pool();
        let operation = DatabaseOperation::Enqueue;
        let job_id = Uuid::new_v4();
        let now = Utc::now();

        let mut tx = pool.begin().await.map_db_err(operation.clone(), None)?;

        sqlx::query(
            r"
            INSERT INTO ingestion_jobs
                (job_id, user_id, upload_session_id, status, attempt_count, max_attempts, next_run_at, created_at, updated_at)
            VALUES
                ($1, $2, $3, 'queued', 0, 3, $4, $4, $4)
            ",
        )
        .bind(job_id)
        .bind(user_id)
        .bind(upload_session_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_db_err(operation.clone(), None)?;

        for document in documents {
            sqlx::query(
                r"
                INSERT INTO uploaded_documents
                    (document_id, job_id, user_id, original_name, stored_name, stored_path, mime_type, size_bytes, structured_status, created_at, updated_at)
                VALUES
                    ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $9)
                ",
            )
            .bind(Uuid::new_v4())
            .bind(job_id)
            .bind(user_id)
            .bind(document.original_name)
            .bind(document.stored_name)
            .bind(document.stored_path)
            .bind(document.mime_type)
            .bind(document.size_bytes)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_db_err(operation.clone(), None)?;
        }

        tx.commit().await.map_db_err(operation, None)?;
        Ok(job_id)
    }

    async fn claim_next(&self) -> DatabaseResult<Option<IngestionJob>> {
        let pool = self.pools.write_pool();
        let operation = DatabaseOperation::ClaimNext;

        let row = sqlx::query(
            r"
            WITH claimed AS (
                UPDATE ingestion_jobs
                SET status = 'processing_structure',
                    attempt_count = attempt_count + 1,
                    updated_at = NOW()
                WHERE job_id = (
                    SELECT job_id FROM ingestion_jobs
                    WHERE status = 'queued'
                      AND next_run_at <= NOW()
                      AND attempt_count < max_attempts
                    ORDER BY created_at ASC
                    LIMIT 1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING *
            )
            SELECT * FROM claimed
            ",
        )
        .fetch_optional(pool)
        .await
        .map_db_err(operation, None)?;

        row.map(|r| row_to_job(&r)).transpose()
    }

    async fn get_documents_for_job(&self, job_id: Uuid) -> DatabaseResult<Vec<UploadedDocument>> {
        let pool = self.pools.read_pool();
        let operation = DatabaseOperation::GetDocumentsForJob { job_id };

        let rows =
            sqlx::query(r"SELECT * FROM uploaded_documents WHERE job_id = $1 ORDER BY created_at ASC")
                .bind(job_id)
                .fetch_all(pool)
                .await
                .map_db_err(operation, None)?;

        rows.iter().map(row_to_document).collect()
    }

    async fn set_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> DatabaseResult<()> {
        let pool = self.pools.write_pool();
        let operation = DatabaseOperation::SetJobStatus { job_id };

        sqlx::query(
            r"UPDATE ingestion_jobs SET status = $2, error = $3, updated_at = NOW() WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(status.to_string())
        .bind(error)
        .execute(pool)
        .await
        .map_db_err(operation, None)?;

        Ok(())
    }

    async fn set_document_structured_status(
        &self,
        document_id: Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> DatabaseResult<()> {
        let pool = self.pools.write_pool();
        let operation = DatabaseOperation::SetDocumentStructuredStatus { document_id };

        sqlx::query(
            r"UPDATE uploaded_documents SET structured_status = $2, error = $3, updated_at = NOW() WHERE document_id = $1",
        )
        .bind(document_id)
        .bind(status.to_string())
        .bind(error)
        .execute(pool)
        .await
        .map_db_err(operation, None)?;

        Ok(())
    }

    async fn fail_with_retry(
        &self,
        job_id: Uuid,
        error_message: &str,
        worker_config: &WorkerConfig,
    ) -> DatabaseResult<()> {
        let pool = self.pools.write_pool();
        let operation = DatabaseOperation::FailWithRetry { job_id };

        let row = sqlx::query(r"SELECT attempt_count, max_attempts FROM ingestion_jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(pool)
            .await
            .map_db_err(operation.clone(), None)?;

        let Some(row) = row else {
            return Ok(());
        };
        let attempt_count: i32 = row.get("attempt_count");
        let max_attempts: i32 = row.get("max_attempts");

        if attempt_count >= max_attempts {
            sqlx::query(
                r"UPDATE ingestion_jobs SET status = 'failed', error = $2, updated_at = NOW() WHERE job_id = $1",
            )
            .bind(job_id)
            .bind(error_message)
            .execute(pool)
            .await
            .map_db_err(operation, None)?;
        } else {
            let attempt_count_u32 = u32::try_from(attempt_count.max(0)).unwrap_or(u32::MAX);
            let backoff = worker_config.backoff_for_attempt(attempt_count_u32);
            let backoff_ms = i64::try_from(backoff.as_millis()).unwrap_or(i64::MAX);
            let next_run_at = Utc::now() + ChronoDuration::milliseconds(backoff_ms);

            sqlx::query(
                r"UPDATE ingestion_jobs SET status = 'queued', error = $2, next_run_at = $3, updated_at = NOW() WHERE job_id = $1",
            )
            .bind(job_id)
            .bind(error_message)
            .bind(next_run_at)
            .execute(pool)
            .await
            .map_db_err(operation, None)?;
        }

        Ok(())
    }

    async fn insert_chunks(
        &self,
        document_id: Uuid,
        texts: Vec<(String, Option<serde_json::Value>)>,
    ) -> DatabaseResult<Vec<PersistedChunk>> {
        let pool = self.pools.write_pool();
        let operation = DatabaseOperation::InsertChunks { document_id };

        let mut persisted = Vec::new();
        let mut chunk_index = 0i32;

        for (text, metadata) in texts {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            let chunk_id = Uuid::new_v4();
            sqlx::query(
                r"INSERT INTO document_chunks (chunk_id, document_id, chunk_index, text, metadata) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(chunk_id)
            .bind(document_id)
            .bind(chunk_index)
            .bind(trimmed)
            .bind(metadata)
            .execute(pool)
            .await
            .map_db_err(operation.clone(), None)?;

            persisted.push(PersistedChunk {
                chunk_id,
                chunk_index,
                text: trimmed.to_string(),
            });
            chunk_index += 1;
        }

        Ok(persisted)
    }

    async fn delete_document_chunks(&self, document_id: Uuid) -> DatabaseResult<()> {
        let pool = self.pools.write_pool();
        let operation = DatabaseOperation::DeleteDocumentChunks { document_id };

        sqlx::query(r"DELETE FROM document_chunks WHERE document_id = $1")
            .bind(document_id)
            .execute(pool)
            .await
            .map_db_err(operation, None)?;

        Ok(())
    }

    async fn get_document_chunks(&self, document_id: Uuid) -> DatabaseResult<Vec<DocumentChunk>> {
        let pool = self.pools.read_pool();
        let operation = DatabaseOperation::Query {
            description: "get_document_chunks".to_string(),
        };

        sqlx::query_as::<_, DocumentChunk>(
            r"SELECT * FROM document_chunks WHERE document_id = $1 ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(pool)
        .await
        .map_db_err(operation, None)
    }

    async fn insert_embedding(
        &self,
        chunk_id: Uuid,
        embedding_model: &str,
        embedding_dim: i32,
        embedding: &[f64],
    ) -> DatabaseResult<()> {
        let pool = self.pools.write_pool();
        let operation = DatabaseOperation::InsertEmbedding { chunk_id };

        let embedding_json = serde_json::to_value(embedding).map_err(|err| {
            into_integrity_error(operation.clone(), format!("non-serializable embedding: {err}"))
        })?;

        sqlx::query(
            r"
            INSERT INTO chunk_embeddings (embedding_id, chunk_id, embedding_model, embedding_dim, embedding)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chunk_id, embedding_model) DO UPDATE
            SET embedding_dim = EXCLUDED.embedding_dim, embedding = EXCLUDED.embedding
            ",
        )
        .bind(Uuid::new_v4())
        .bind(chunk_id)
        .bind(embedding_model)
        .bind(embedding_dim)
        .bind(embedding_json)
        .execute(pool)
        .await
        .map_db_err(operation, None)?;

        Ok(())
    }

    async fn document_fully_embedded(
        &self,
        document_id: Uuid,
        embedding_model: &str,
    ) -> DatabaseResult<bool> {
        let pool = self.pools.read_pool();
        let operation = DatabaseOperation::Query {
            description: "document_fully_embedded".to_string(),
        };

        let row = sqlx::query(
            r"
            SELECT COUNT(*) FILTER (WHERE e.chunk_id IS NULL) AS missing
            FROM document_chunks c
            LEFT JOIN chunk_embeddings e
                ON e.chunk_id = c.chunk_id AND e.embedding_model = $2
            WHERE c.document_id = $1
            ",
        )
        .bind(document_id)
        .bind(embedding_model)
        .fetch_one(pool)
        .await
        .map_db_err(operation, None)?;

        let missing: i64 = row.get("missing");
        Ok(missing == 0)
    }

    async fn get_job_with_documents(
        &self,
        job_id: Uuid,
        user_id: &str,
    ) -> DatabaseResult<Option<(IngestionJob, Vec<UploadedDocument>)>> {
        let pool = self.pools.read_pool();
        let operation = DatabaseOperation::GetJobWithDocuments { job_id };

        let job_row = sqlx::query(r"SELECT * FROM ingestion_jobs WHERE job_id = $1 AND user_id = $2")
            .bind(job_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_db_err(operation, None)?;

        let Some(job_row) = job_row else {
            return Ok(None);
        };
        let job = row_to_job(&job_row)?;
        let documents = self.get_documents_for_job(job_id).await?;
        Ok(Some((job, documents)))
    }

    async fn recover_stale_claims(&self, stale_after_ms: i64) -> DatabaseResult<u64> {
        let pool = self.pools.write_pool();
        let operation = DatabaseOperation::ReaperSweep;

        let cutoff = Utc::now() - ChronoDuration::milliseconds(stale_after_ms);

        let result = sqlx::query(
            r"
            UPDATE ingestion_jobs
            SET status = 'queued',
                next_run_at = NOW(),
                updated_at = NOW()
            WHERE status IN ('processing_structure', 'processing_embeddings')
              AND updated_at < $1
            ",
        )
        .bind(cutoff)
        .execute(pool)
        .await
        .map_db_err(operation, None)?;

        Ok(result.rows_affected())
    }

    async fn get_chunk_embeddings(&self, document_id: Uuid) -> DatabaseResult<Vec<ChunkEmbedding>> {
        let pool = self.pools.read_pool();
        let operation = DatabaseOperation::Query {
            description: "get_chunk_embeddings".to_string(),
        };

        sqlx::query_as::<_, ChunkEmbedding>(
            r"
            SELECT e.*
            FROM chunk_embeddings e
            JOIN document_chunks c ON c.chunk_id = e.chunk_id
            WHERE c.document_id = $1
            ORDER BY c.chunk_index ASC
            ",
        )
        .bind(document_id)
        .fetch_all(pool)
        .await
        .map_db_err(operation, None)
    }
}
