//! Domain models for the four ingestion entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an [`IngestionJob`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    ProcessingStructure,
    ProcessingEmbeddings,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing_structure" => Ok(Self::ProcessingStructure),
            "processing_embeddings" => Ok(Self::ProcessingEmbeddings),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid job status: {s}")),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::ProcessingStructure => "processing_structure",
            Self::ProcessingEmbeddings => "processing_embeddings",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Status of an [`UploadedDocument`]'s structuring pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Structured,
    Unsupported,
    Failed,
}

impl DocumentStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Structured | Self::Unsupported | Self::Failed)
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "structured" => Ok(Self::Structured),
            "unsupported" => Ok(Self::Unsupported),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid document status: {s}")),
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Structured => "structured",
            Self::Unsupported => "unsupported",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One row per ingestion job spanning an upload session's files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
    pub job_id: Uuid,
    pub user_id: String,
    pub upload_session_id: String,
    pub status: JobStatus,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_run_at: DateTime<Utc>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row per file within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub document_id: Uuid,
    pub job_id: Uuid,
    pub user_id: String,
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub structured_status: DocumentStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single extracted segment of text belonging to a document.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentChunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// An embedding vector computed for one chunk under one embedding model.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChunkEmbedding {
    pub embedding_id: Uuid,
    pub chunk_id: Uuid,
    pub embedding_model: String,
    pub embedding_dim: i32,
    pub embedding: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// One file to ingest, as carried by the Enqueue boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedDocument {
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// A chunk freshly assigned its dense sequential index by `insert_chunks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedChunk {
    pub chunk_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
}
