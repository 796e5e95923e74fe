//! Capability interfaces for the structuring and embedding providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ProviderResult;

/// One chunk extracted from a document by a [`Structurer`], before persistence
/// assigns it its final dense `chunk_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredChunk {
    pub text: String,
    pub metadata: Option<serde_json::Value>,
}

/// Tagged outcome of a structuring attempt. Matched exhaustively by the Processor;
/// `Unsupported` and `Failed` are normal returns, not thrown errors.
#[derive(Debug, Clone)]
pub enum StructureResult {
    Structured { chunks: Vec<StructuredChunk> },
    Unsupported { reason: String },
    Failed { reason: String },
}

/// Extracts structured chunks from a document on disk.
#[async_trait]
pub trait Structurer: Send + Sync {
    /// Structures the file at `path`, given its reported `mime` type.
    ///
    /// # Errors
    /// Returns an error only for unexpected failures (transport, provider
    /// misconfiguration); inability to handle the file shape is reported as
    /// `StructureResult::Unsupported`/`Failed`, not an error.
    async fn structure(&self, path: &Path, mime: &str) -> ProviderResult<StructureResult>;

    /// Identifies this provider in diagnostics (e.g. `"deterministic"`, `"remote:llama3"`).
    fn id(&self) -> &str;
}

/// A computed embedding vector and the metadata needed to persist it.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub model: String,
    pub dimensions: usize,
    pub vector: Vec<f64>,
}

/// Produces an embedding vector for a chunk's text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// # Errors
    /// Returns an error on transport failure, a non-OK response, or a malformed/empty
    /// vector payload.
    async fn embed(&self, text: &str) -> ProviderResult<Embedding>;

    fn id(&self) -> &str;
}
