//! Builds the configured [`Structurer`]/[`Embedder`] implementation from
//! [`ingestor_config`] settings, so the worker never matches on `ProviderKind` itself.

use ingestor_config::{EmbedderConfig, ProviderKind, StructurerConfig};
use std::sync::Arc;

use crate::embedder::deterministic::DeterministicEmbedder;
use crate::embedder::remote::RemoteEmbedder;
use crate::error::ProviderResult;
use crate::structurer::deterministic::DeterministicStructurer;
use crate::structurer::remote::RemoteStructurer;
use crate::traits::{Embedder, Structurer};

/// # Errors
/// Returns an error if a `remote` provider's HTTP client fails to build.
pub fn build_structurer(config: &StructurerConfig) -> ProviderResult<Arc<dyn Structurer>> {
    match config.provider {
        ProviderKind::Deterministic => Ok(Arc::new(DeterministicStructurer::new())),
        ProviderKind::Remote => Ok(Arc::new(RemoteStructurer::new(config.clone())?)),
    }
}

/// # Errors
/// Returns an error if a `remote` provider's HTTP client fails to build.
pub fn build_embedder(config: &EmbedderConfig) -> ProviderResult<Arc<dyn Embedder>> {
    match config.provider {
        ProviderKind::Deterministic => Ok(Arc::new(DeterministicEmbedder::new())),
        ProviderKind::Remote => Ok(Arc::new(RemoteEmbedder::new(config.clone())?)),
    }
}
