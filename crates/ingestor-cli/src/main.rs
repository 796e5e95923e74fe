//! Operator entry point for the ingestion pipeline worker.
//!
//! `serve` runs the worker and reaper loops until shutdown; `enqueue` and `status`
//! are thin operator shortcuts onto the same [`ingestor_store::Store`] the HTTP
//! upload endpoint would use, for driving the pipeline without that endpoint.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use ingestor_config::ApplicationConfig;
use ingestor_config::validation::Validate;
use ingestor_providers::factory::{build_embedder, build_structurer};
use ingestor_store::{PgStore, PoolConfig, PoolManager, StagedDocument, Store, run_migrations};
use ingestor_worker::{BackgroundWorker, Processor, Reaper};
use uuid::Uuid;

type MainResult = anyhow::Result<()>;

#[derive(Parser)]
#[command(name = "ingestor", about = "Asynchronous document-ingestion pipeline worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker and reaper loops until interrupted.
    Serve,
    /// Stage a document for ingestion and print the resulting job id.
    Enqueue {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        upload_session_id: String,
        /// Path to a file already present under the worker's upload root.
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,
    },
    /// Print the status of a job and its documents.
    Status {
        #[arg(long)]
        job_id: Uuid,
        #[arg(long)]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> MainResult {
    ingestor_common::initialize_environment();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ApplicationConfig::from_env();
    config.validate()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => serve(config).await,
        Command::Enqueue { user_id, upload_session_id, file, mime_type } => {
            enqueue(config, &user_id, &upload_session_id, &file, &mime_type).await
        }
        Command::Status { job_id, user_id } => status(config, job_id, &user_id).await,
    }
}

async fn connect(config: &ApplicationConfig) -> anyhow::Result<PgStore> {
    let pools = PoolManager::new(&config.database, PoolConfig::default()).await?;
    run_migrations(pools.write_pool()).await?;
    Ok(PgStore::new(pools))
}

async fn serve(config: ApplicationConfig) -> MainResult {
    tracing::info!(
        profile = %config.profile,
        database = %config.database.safe_connection_string(),
        structurer = ?config.structurer.provider,
        embedder = ?config.embedder.provider,
        "starting ingestor"
    );

    let store: Arc<dyn Store> = Arc::new(connect(&config).await?);
    let structurer = build_structurer(&config.structurer)?;
    let embedder = build_embedder(&config.embedder)?;
    let upload_root = PathBuf::from(&config.worker.upload_root);

    let processor = Arc::new(Processor::new(
        Arc::clone(&store),
        structurer,
        embedder,
        config.structurer.clone(),
        config.embedder.clone(),
        config.worker.clone(),
        upload_root,
    ));

    let worker = BackgroundWorker::new(Arc::clone(&store), processor, config.worker.clone());
    let shutdown = worker.shutdown_handle();
    let reaper = Reaper::new(Arc::clone(&store), config.worker.clone(), Arc::clone(&shutdown));

    worker.wait_for_database().await;

    let worker_handle = tokio::spawn(async move { worker.run().await });
    let reaper_handle = tokio::spawn(async move { reaper.run().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, waiting for in-flight work to finish");
    shutdown.store(true, Ordering::Relaxed);

    worker_handle.await?;
    reaper_handle.await?;
    Ok(())
}

async fn enqueue(
    config: ApplicationConfig,
    user_id: &str,
    upload_session_id: &str,
    file: &PathBuf,
    mime_type: &str,
) -> MainResult {
    let store = connect(&config).await?;
    let metadata = tokio::fs::metadata(file).await?;
    let original_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document")
        .to_string();
    let stored_path = file
        .strip_prefix(&config.worker.upload_root)
        .unwrap_or(file)
        .to_string_lossy()
        .into_owned();

    let job_id = store
        .enqueue(
            user_id,
            upload_session_id,
            vec![StagedDocument {
                original_name: original_name.clone(),
                stored_name: original_name,
                stored_path,
                mime_type: mime_type.to_string(),
                size_bytes: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            }],
        )
        .await?;

    println!("{job_id}");
    Ok(())
}

async fn status(config: ApplicationConfig, job_id: Uuid, user_id: &str) -> MainResult {
    let store = connect(&config).await?;
    let Some((job, documents)) = store.get_job_with_documents(job_id, user_id).await? else {
        println!("no job {job_id} found for user {user_id}");
        return Ok(());
    };

    println!(
        "job {job_id} status={} attempt={}/{} error={}",
        job.status,
        job.attempt_count,
        job.max_attempts,
        job.error.as_deref().unwrap_or("-")
    );
    for document in documents {
        let fully_embedded = store
            .document_fully_embedded(document.document_id, &config.embedder.model_name)
            .await?;
        println!(
            "  document {} ({}) status={} fully_embedded={} error={}",
            document.document_id,
            document.original_name,
            document.structured_status,
            fully_embedded,
            document.error.as_deref().unwrap_or("-")
        );
        let embeddings = store.get_chunk_embeddings(document.document_id).await?;
        for embedding in embeddings {
            println!(
                "    chunk {} model={} dim={}",
                embedding.chunk_id, embedding.embedding_model, embedding.embedding_dim
            );
        }
    }
    Ok(())
}
