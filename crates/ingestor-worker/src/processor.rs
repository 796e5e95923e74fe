//! Per-job processing: structure each pending document, persist its chunks,
//! embed them in order, and drive the job through to a terminal status.

use ingestor_common::CorrelationId;
use ingestor_config::validation::Validate;
use ingestor_config::{EmbedderConfig, StructurerConfig, WorkerConfig};
use ingestor_providers::{Embedder, StructureResult, Structurer};
use ingestor_store::{DocumentStatus, JobStatus, Store};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};

/// Joins `stored_path` onto `root` and rejects anything that would escape it —
/// absolute components or `..` segments — without touching the filesystem, so a
/// not-yet-created path still fails closed.
fn resolve_under_root(root: &Path, stored_path: &str) -> WorkerResult<PathBuf> {
    let candidate = Path::new(stored_path);
    let mut resolved = root.to_path_buf();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(WorkerError::PathTraversal(stored_path.to_string()));
            }
        }
    }
    Ok(resolved)
}

pub struct Processor {
    store: Arc<dyn Store>,
    structurer: Arc<dyn Structurer>,
    embedder: Arc<dyn Embedder>,
    structurer_config: StructurerConfig,
    embedder_config: EmbedderConfig,
    worker_config: WorkerConfig,
    upload_root: PathBuf,
}

impl Processor {
    pub fn new(
        store: Arc<dyn Store>,
        structurer: Arc<dyn Structurer>,
        embedder: Arc<dyn Embedder>,
        structurer_config: StructurerConfig,
        embedder_config: EmbedderConfig,
        worker_config: WorkerConfig,
        upload_root: PathBuf,
    ) -> Self {
        Self {
            store,
            structurer,
            embedder,
            structurer_config,
            embedder_config,
            worker_config,
            upload_root,
        }
    }

    /// Processes one claimed job to completion. Never returns an error to the
    /// caller — every failure path is translated into a `failWithRetry` call.
    ///
    /// Runs under a span tagged with a fresh [`CorrelationId`] so every log line
    /// emitted while this job is in flight, across every Store/Provider call it
    /// makes, can be traced back to this one attempt.
    pub async fn process(&self, job_id: Uuid) -> WorkerResult<()> {
        let correlation_id = CorrelationId::new();
        async {
            if let Err(err) = self.process_inner(job_id).await {
                tracing::warn!(error = %err, "job processing failed, scheduling retry");
                self.store
                    .fail_with_retry(job_id, &err.to_string(), &self.worker_config)
                    .await?;
            }
            Ok::<(), WorkerError>(())
        }
        .instrument(tracing::info_span!("process_job", job_id = %job_id, %correlation_id))
        .await
    }

    async fn process_inner(&self, job_id: Uuid) -> WorkerResult<()> {
        self.structurer_config
            .validate()
            .map_err(|err| WorkerError::Configuration(err.to_string()))?;
        self.embedder_config
            .validate()
            .map_err(|err| WorkerError::Configuration(err.to_string()))?;

        let documents = self.store.get_documents_for_job(job_id).await?;

        for document in documents {
            match document.structured_status {
                DocumentStatus::Structured | DocumentStatus::Unsupported | DocumentStatus::Failed => {
                    continue;
                }
                DocumentStatus::Processing => {
                    self.store.delete_document_chunks(document.document_id).await?;
                }
                DocumentStatus::Pending => {}
            }

            self.store
                .set_document_structured_status(document.document_id, DocumentStatus::Processing, None)
                .await?;

            let absolute_path = resolve_under_root(&self.upload_root, &document.stored_path)?;

            let structure_result = self
                .structurer
                .structure(&absolute_path, &document.mime_type)
                .await?;

            match structure_result {
                StructureResult::Unsupported { reason } => {
                    self.store
                        .set_document_structured_status(
                            document.document_id,
                            DocumentStatus::Unsupported,
                            Some(&reason),
                        )
                        .await?;
                }
                StructureResult::Failed { reason } => {
                    self.store
                        .set_document_structured_status(
                            document.document_id,
                            DocumentStatus::Failed,
                            Some(&reason),
                        )
                        .await?;
                }
                StructureResult::Structured { chunks } => {
                    let texts = chunks.into_iter().map(|c| (c.text, c.metadata)).collect();
                    let persisted = self.store.insert_chunks(document.document_id, texts).await?;

                    self.store
                        .set_job_status(job_id, JobStatus::ProcessingEmbeddings, None)
                        .await?;

                    for chunk in persisted {
                        let embedding = self.embedder.embed(&chunk.text).await?;
                        #[allow(clippy::cast_possible_wrap)]
                        let dimensions = embedding.dimensions as i32;
                        self.store
                            .insert_embedding(chunk.chunk_id, &embedding.model, dimensions, &embedding.vector)
                            .await?;
                    }

                    self.store
                        .set_document_structured_status(document.document_id, DocumentStatus::Structured, None)
                        .await?;
                }
            }
        }

        self.store.set_job_status(job_id, JobStatus::Completed, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_dir_traversal() {
        let root = Path::new("/var/lib/ingestor/uploads");
        let err = resolve_under_root(root, "../../etc/passwd").unwrap_err();
        assert!(matches!(err, WorkerError::PathTraversal(_)));
    }

    #[test]
    fn rejects_absolute_stored_path() {
        let root = Path::new("/var/lib/ingestor/uploads");
        let err = resolve_under_root(root, "/etc/passwd").unwrap_err();
        assert!(matches!(err, WorkerError::PathTraversal(_)));
    }

    #[test]
    fn resolves_relative_path_under_root() {
        let root = Path::new("/var/lib/ingestor/uploads");
        let resolved = resolve_under_root(root, "session-1/doc.csv").unwrap();
        assert_eq!(resolved, Path::new("/var/lib/ingestor/uploads/session-1/doc.csv"));
    }
}
