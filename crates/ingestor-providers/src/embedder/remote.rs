//! Remote-model embedder: posts text to an embeddings endpoint and validates the
//! returned vector.

use async_trait::async_trait;
use ingestor_config::EmbedderConfig;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{Embedder, Embedding};

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f64>,
}

pub struct RemoteEmbedder {
    client: reqwest::Client,
    config: EmbedderConfig,
}

impl RemoteEmbedder {
    /// # Errors
    /// Returns an error if the transport client fails to build.
    pub fn new(config: EmbedderConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|source| ProviderError::Transport {
                provider: "remote".to_string(),
                model: config.model_name.clone(),
                source,
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> ProviderResult<Embedding> {
        let url = format!(
            "{}/api/embeddings",
            self.config.model_base_url.trim_end_matches('/')
        );

        let mut request = self.client.post(&url).json(&json!({
            "model": self.config.model_name,
            "prompt": text,
        }));
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: "remote".to_string(),
                model: self.config.model_name.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ErrorResponse {
                provider: "remote".to_string(),
                model: self.config.model_name.clone(),
                message: format!("HTTP {status}: {body_text}"),
            });
        }

        let parsed: EmbedResponse =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Transport {
                    provider: "remote".to_string(),
                    model: self.config.model_name.clone(),
                    source,
                })?;

        if parsed.embedding.is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: "remote".to_string(),
                model: self.config.model_name.clone(),
                message: "embedding vector is empty".to_string(),
            });
        }
        if parsed.embedding.iter().any(|v| !v.is_finite()) {
            return Err(ProviderError::MalformedResponse {
                provider: "remote".to_string(),
                model: self.config.model_name.clone(),
                message: "embedding vector contains a non-finite value".to_string(),
            });
        }

        Ok(Embedding {
            model: self.config.model_name.clone(),
            dimensions: parsed.embedding.len(),
            vector: parsed.embedding,
        })
    }

    fn id(&self) -> &str {
        "remote"
    }
}
