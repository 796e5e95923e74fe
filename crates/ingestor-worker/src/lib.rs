//! The ingestion pipeline's worker process: claim jobs from the queue, structure
//! and embed their documents, and requeue stale claims left behind by a crashed
//! worker.

pub mod error;
pub mod processor;
pub mod reaper;
pub mod worker;

pub use error::{WorkerError, WorkerResult};
pub use processor::Processor;
pub use reaper::Reaper;
pub use worker::BackgroundWorker;
