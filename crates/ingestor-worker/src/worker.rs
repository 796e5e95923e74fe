//! Background worker for processing ingestion jobs.
//!
//! Runs a single-in-flight polling loop: each tick claims at most one job and
//! awaits its full processing before the next tick starts, guarded by a reentrancy
//! flag. A sibling [`crate::reaper::Reaper`] task runs on its own interval requeuing
//! stale claims.

use ingestor_config::WorkerConfig;
use ingestor_store::{DatabaseError, Store};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{Duration, Instant, sleep};

use crate::processor::Processor;

pub struct BackgroundWorker {
    store: Arc<dyn Store>,
    processor: Arc<Processor>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
}

impl BackgroundWorker {
    pub fn new(store: Arc<dyn Store>, processor: Arc<Processor>, config: WorkerConfig) -> Self {
        Self {
            store,
            processor,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle the caller can flip to trigger graceful shutdown (and share with a
    /// [`crate::reaper::Reaper`] running alongside this worker).
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Waits up to `dbWaitTimeoutMs` for a side-effect-free `ping` to return anything
    /// other than a transient-infrastructure error, polling every `dbWaitPollMs`.
    /// Does not treat a non-transient error as a reason to keep waiting.
    pub async fn wait_for_database(&self) {
        let deadline = Instant::now() + Duration::from_millis(self.config.db_wait_timeout_ms);
        loop {
            match self.store.ping().await {
                Err(DatabaseError::TransientUnavailable { .. }) if Instant::now() < deadline => {
                    tracing::debug!("database not ready yet, waiting");
                    sleep(Duration::from_millis(self.config.db_wait_poll_ms)).await;
                }
                _ => return,
            }
        }
    }

    /// Runs the polling loop until the shutdown flag is set. The in-flight tick,
    /// if any, is always allowed to finish before returning.
    pub async fn run(&self) {
        tracing::info!(poll_interval_ms = self.config.poll_interval_ms, "worker started");

        let mut transient_logged = false;
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));

        loop {
            ticker.tick().await;

            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            if self.in_flight.swap(true, Ordering::AcqRel) {
                continue;
            }

            let result = self.tick().await;
            self.in_flight.store(false, Ordering::Release);

            match result {
                Ok(true) => transient_logged = false,
                Ok(false) => {}
                Err(err) if err.is_transient_infra() => {
                    if !transient_logged {
                        tracing::warn!(error = %err, "transient database error, will retry");
                        transient_logged = true;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "claimNext failed");
                    transient_logged = false;
                }
            }
        }

        tracing::info!("worker stopped gracefully");
    }

    /// One tick: claim at most one job and process it. Returns `Ok(true)` if a job
    /// was claimed and processed, `Ok(false)` if the queue was empty.
    async fn tick(&self) -> Result<bool, crate::error::WorkerError> {
        let Some(job) = self.store.claim_next().await? else {
            return Ok(false);
        };
        self.processor.process(job.job_id).await?;
        Ok(true)
    }
}
