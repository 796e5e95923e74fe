//! Stale-claim reaper: a side task that rewrites jobs stuck in `processing_structure`/
//! `processing_embeddings` back to `queued` once they are older than `staleClaimMs`.

use ingestor_config::WorkerConfig;
use ingestor_store::Store;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{Duration, interval};

pub struct Reaper {
    store: Arc<dyn Store>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl Reaper {
    pub fn new(store: Arc<dyn Store>, config: WorkerConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self { store, config, shutdown }
    }

    /// Runs until the shutdown flag is set, sweeping on `reaperIntervalMs`.
    pub async fn run(&self) {
        let mut ticker = interval(Duration::from_millis(self.config.reaper_interval_ms));
        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match self.store.recover_stale_claims(self.stale_after_ms()).await {
                Ok(0) => {}
                Ok(reclaimed) => {
                    tracing::info!(reclaimed, "reaper requeued stale job claims");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "reaper sweep failed");
                }
            }
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn stale_after_ms(&self) -> i64 {
        self.config.stale_claim_ms as i64
    }
}
