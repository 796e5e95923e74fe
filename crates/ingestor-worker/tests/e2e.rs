//! End-to-end scenarios driving the Processor against `MockStore` and the
//! deterministic providers, with real files on disk under a temp upload root.

use chrono::Utc;
use ingestor_config::{EmbedderConfig, ProviderKind, StructurerConfig, WorkerConfig};
use ingestor_providers::embedder::deterministic::DeterministicEmbedder;
use ingestor_providers::structurer::deterministic::DeterministicStructurer;
use ingestor_store::{DocumentStatus, JobStatus, MockStore, StagedDocument, Store};
use ingestor_worker::Processor;
use std::sync::Arc;

fn structurer_config() -> StructurerConfig {
    let mut config = StructurerConfig::from_env();
    config.provider = ProviderKind::Deterministic;
    config
}

fn embedder_config() -> EmbedderConfig {
    let mut config = EmbedderConfig::from_env();
    config.provider = ProviderKind::Deterministic;
    config
}

fn processor(store: Arc<MockStore>, upload_root: std::path::PathBuf) -> Processor {
    processor_with_worker_config(store, upload_root, WorkerConfig::from_env())
}

fn processor_with_worker_config(
    store: Arc<MockStore>,
    upload_root: std::path::PathBuf,
    worker_config: WorkerConfig,
) -> Processor {
    Processor::new(
        store,
        Arc::new(DeterministicStructurer::new()),
        Arc::new(DeterministicEmbedder::new()),
        structurer_config(),
        embedder_config(),
        worker_config,
        upload_root,
    )
}

#[tokio::test]
async fn csv_document_structures_into_indexed_chunks() {
    let upload_dir = tempfile::tempdir().unwrap();
    std::fs::write(upload_dir.path().join("doc.csv"), "a,b\n1,2\n3,4").unwrap();

    let store = Arc::new(MockStore::new());
    let job_id = store
        .enqueue(
            "user-1",
            "session-1",
            vec![StagedDocument {
                original_name: "doc.csv".to_string(),
                stored_name: "doc.csv".to_string(),
                stored_path: "doc.csv".to_string(),
                mime_type: "text/csv".to_string(),
                size_bytes: 11,
            }],
        )
        .await
        .unwrap();

    let proc = processor(Arc::clone(&store), upload_dir.path().to_path_buf());
    proc.process(job_id).await.unwrap();

    let (job, documents) = store
        .get_job_with_documents(job_id, "user-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].structured_status, DocumentStatus::Structured);

    let chunks = store.get_document_chunks(documents[0].document_id).await.unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[0].text, "a | b");
    assert_eq!(chunks[2].text, "3 | 4");
}

#[tokio::test]
async fn markdown_document_splits_on_headings() {
    let upload_dir = tempfile::tempdir().unwrap();
    std::fs::write(upload_dir.path().join("doc.md"), "# A\ntext\n# B\ntext2").unwrap();

    let store = Arc::new(MockStore::new());
    let job_id = store
        .enqueue(
            "user-1",
            "session-1",
            vec![StagedDocument {
                original_name: "doc.md".to_string(),
                stored_name: "doc.md".to_string(),
                stored_path: "doc.md".to_string(),
                mime_type: "text/markdown".to_string(),
                size_bytes: 19,
            }],
        )
        .await
        .unwrap();

    let proc = processor(Arc::clone(&store), upload_dir.path().to_path_buf());
    proc.process(job_id).await.unwrap();

    let documents = store.get_documents_for_job(job_id).await.unwrap();
    let chunks = store.get_document_chunks(documents[0].document_id).await.unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, "# A\ntext");
    assert_eq!(chunks[1].text, "# B\ntext2");
}

#[tokio::test]
async fn unsupported_extension_completes_job_without_chunks() {
    let upload_dir = tempfile::tempdir().unwrap();
    std::fs::write(upload_dir.path().join("doc.bin"), [0u8, 1, 2]).unwrap();

    let store = Arc::new(MockStore::new());
    let job_id = store
        .enqueue(
            "user-1",
            "session-1",
            vec![StagedDocument {
                original_name: "doc.bin".to_string(),
                stored_name: "doc.bin".to_string(),
                stored_path: "doc.bin".to_string(),
                mime_type: "application/octet-stream".to_string(),
                size_bytes: 3,
            }],
        )
        .await
        .unwrap();

    let proc = processor(Arc::clone(&store), upload_dir.path().to_path_buf());
    proc.process(job_id).await.unwrap();

    let (job, documents) = store
        .get_job_with_documents(job_id, "user-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(documents[0].structured_status, DocumentStatus::Unsupported);
    let chunks = store.get_document_chunks(documents[0].document_id).await.unwrap();
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn empty_document_list_completes_in_one_tick() {
    let upload_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MockStore::new());
    let job_id = store.enqueue("user-1", "session-1", vec![]).await.unwrap();

    let proc = processor(Arc::clone(&store), upload_dir.path().to_path_buf());
    proc.process(job_id).await.unwrap();

    let (job, documents) = store
        .get_job_with_documents(job_id, "user-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(documents.is_empty());
}

#[tokio::test]
async fn path_traversal_in_stored_path_fails_the_document_and_retries_the_job() {
    let upload_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MockStore::new());
    let job_id = store
        .enqueue(
            "user-1",
            "session-1",
            vec![StagedDocument {
                original_name: "evil.csv".to_string(),
                stored_name: "evil.csv".to_string(),
                stored_path: "../../etc/passwd".to_string(),
                mime_type: "text/csv".to_string(),
                size_bytes: 0,
            }],
        )
        .await
        .unwrap();

    let proc = processor(Arc::clone(&store), upload_dir.path().to_path_buf());
    proc.process(job_id).await.unwrap();

    let job = store
        .get_job_with_documents(job_id, "user-1")
        .await
        .unwrap()
        .unwrap()
        .0;
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.error.unwrap().contains("path traversal"));
}

#[tokio::test]
async fn failed_attempt_backoff_respects_the_configured_ceiling() {
    let upload_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MockStore::new());
    let job_id = store
        .enqueue(
            "user-1",
            "session-1",
            vec![StagedDocument {
                original_name: "evil.csv".to_string(),
                stored_name: "evil.csv".to_string(),
                stored_path: "../../etc/passwd".to_string(),
                mime_type: "text/csv".to_string(),
                size_bytes: 0,
            }],
        )
        .await
        .unwrap();

    let mut worker_config = WorkerConfig::from_env();
    worker_config.backoff_floor_ms = 42_000;
    worker_config.backoff_ceiling_ms = 42_000;

    let proc = processor_with_worker_config(Arc::clone(&store), upload_dir.path().to_path_buf(), worker_config);
    proc.process(job_id).await.unwrap();

    let job = store
        .get_job_with_documents(job_id, "user-1")
        .await
        .unwrap()
        .unwrap()
        .0;
    assert_eq!(job.status, JobStatus::Queued);

    let delay = job.next_run_at - Utc::now();
    assert!(
        delay.num_milliseconds() > 40_000,
        "expected the 42s floor/ceiling to drive next_run_at, got {delay:?}"
    );
}
