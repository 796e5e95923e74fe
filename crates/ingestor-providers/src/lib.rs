//! Structuring and embedding providers for the ingestion pipeline.
//!
//! A [`Structurer`] turns a document on disk into chunks; an [`Embedder`] turns chunk
//! text into a vector. Both capabilities ship a deterministic, model-free
//! implementation alongside a remote-HTTP one, selected at startup by
//! [`factory::build_structurer`]/[`factory::build_embedder`] from [`ingestor_config`].

pub mod embedder;
pub mod error;
pub mod factory;
pub mod structurer;
pub mod traits;

pub use error::{ProviderError, ProviderResult};
pub use factory::{build_embedder, build_structurer};
pub use traits::{Embedder, Embedding, StructuredChunk, Structurer, StructureResult};
