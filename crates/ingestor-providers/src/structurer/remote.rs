//! Remote-model structurer: sends document text to a chat/completion endpoint and
//! parses a fixed `{"chunks":[...]}` JSON schema out of the response.

use async_trait::async_trait;
use ingestor_config::{ChatApiStyle, StructurerConfig};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::extractor::{DefaultTextExtractor, TextExtractor};
use crate::error::{ProviderError, ProviderResult};
use crate::traits::{StructuredChunk, Structurer, StructureResult};

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "txt", "csv", "md", "markdown", "json", "xml", "html", "htm", "pdf", "docx", "doc",
];
const MAX_SEGMENT_CHARS_FALLBACK: usize = 12_000;

pub struct RemoteStructurer {
    client: reqwest::Client,
    config: StructurerConfig,
    extractor: Arc<dyn TextExtractor>,
}

impl RemoteStructurer {
    /// # Errors
    /// Returns an error if the transport client fails to build (invalid timeout/TLS config).
    pub fn new(config: StructurerConfig) -> ProviderResult<Self> {
        Self::with_extractor(config, Arc::new(DefaultTextExtractor))
    }

    /// Same as [`Self::new`] but with an injected [`TextExtractor`], so tests can
    /// exercise `structure` without a real PDF/DOCX file or a real model backend.
    ///
    /// # Errors
    /// Returns an error if the transport client fails to build (invalid timeout/TLS config).
    pub fn with_extractor(config: StructurerConfig, extractor: Arc<dyn TextExtractor>) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|source| ProviderError::Transport {
                provider: "remote".to_string(),
                model: config.model_name.clone(),
                source,
            })?;
        Ok(Self { client, config, extractor })
    }

    fn segment(&self, text: &str) -> Vec<String> {
        let normalized = text.replace("\r\n", "\n");
        let max_chars = self
            .config
            .max_segment_chars
            .max(1)
            .min(MAX_SEGMENT_CHARS_FALLBACK.max(self.config.max_segment_chars));
        let chars: Vec<char> = normalized.chars().collect();
        chars
            .chunks(max_chars)
            .map(|c| c.iter().collect())
            .collect()
    }

    async fn call_model(&self, prompt: &str) -> ProviderResult<String> {
        let system_prompt = r#"Return only JSON matching {"chunks":[{"chunkIndex":0,"text":"string","metadata":{}}]}"#;

        let body = match self.config.api_style {
            ChatApiStyle::Native => json!({
                "model": self.config.model_name,
                "prompt": format!("{system_prompt}\n\n{prompt}"),
                "stream": false,
                "options": {
                    "temperature": self.config.temperature,
                    "num_ctx": self.config.num_ctx,
                }
            }),
            ChatApiStyle::OpenAi => json!({
                "model": self.config.model_name,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": prompt},
                ],
                "temperature": self.config.temperature,
                "max_tokens": self.config.max_tokens,
            }),
        };

        let path = match self.config.api_style {
            ChatApiStyle::Native => "/api/generate",
            ChatApiStyle::OpenAi => "/v1/chat/completions",
        };
        let url = format!("{}{path}", self.config.model_base_url.trim_end_matches('/'));

        let mut request = self.client.post(&url).json(&body);
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

        let payload: Value =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Transport {
                    provider: "remote".to_string(),
                    model: self.config.model_name.clone(),
                    source,
                })?;

        extract_content(&payload, &self.config)
    }

    fn parse_chunks(&self, raw: &str, segment_index: usize, extension: &str) -> ProviderResult<Vec<StructuredChunk>> {
        let json_text = extract_json_text(raw).ok_or_else(|| ProviderError::MalformedResponse {
            provider: "remote".to_string(),
            model: self.config.model_name.clone(),
            message: "no JSON object found in model response".to_string(),
        })?;

        let parsed: Value =
            serde_json::from_str(&json_text).map_err(|err| ProviderError::MalformedResponse {
                provider: "remote".to_string(),
                model: self.config.model_name.clone(),
                message: format!("invalid JSON: {err}"),
            })?;

        let chunks_value = parsed.get("chunks").and_then(Value::as_array).ok_or_else(|| {
            ProviderError::MalformedResponse {
                provider: "remote".to_string(),
                model: self.config.model_name.clone(),
                message: "response missing a \"chunks\" array".to_string(),
            }
        })?;

        let mut chunks = Vec::new();
        for entry in chunks_value {
            let Some(text) = entry.get("text").and_then(Value::as_str) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            let mut metadata = entry
                .get("metadata")
                .filter(|m| m.is_object())
                .cloned()
                .unwrap_or_else(|| json!({}));
            if let Some(obj) = metadata.as_object_mut() {
                obj.insert("sourceExtension".to_string(), json!(extension));
                obj.insert("segmentIndex".to_string(), json!(segment_index));
            }
            chunks.push(StructuredChunk {
                text: text.to_string(),
                metadata: Some(metadata),
            });
        }

        if chunks.is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: "remote".to_string(),
                model: self.config.model_name.clone(),
                message: format!("segment {segment_index} normalized to zero chunks"),
            });
        }

        Ok(chunks)
    }
}

/// Pulls assistant text out of either the native `{response}` shape or the
/// OpenAI-compatible `{choices:[{message:{content}}]}` shape. Array `content` parts
/// are concatenated preserving order (string parts verbatim, object parts via `.text`).
fn extract_content(payload: &Value, config: &StructurerConfig) -> ProviderResult<String> {
    if let Some(text) = payload.get("response").and_then(Value::as_str) {
        return Ok(text.to_string());
    }

    let content = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"));

    match content {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Array(parts)) => {
            let mut joined = String::new();
            for part in parts {
                if let Some(text) = part.as_str() {
                    joined.push_str(text);
                } else if let Some(text) = part.get("text").and_then(Value::as_str) {
                    joined.push_str(text);
                }
            }
            Ok(joined)
        }
        _ => Err(ProviderError::MalformedResponse {
            provider: "remote".to_string(),
            model: config.model_name.clone(),
            message: "response missing both \"response\" and \"choices[].message.content\""
                .to_string(),
        }),
    }
}

/// Accepts a bare JSON object, one fenced in a code block, or the substring spanning
/// the first `{` to the last `}`.
fn extract_json_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed.to_string());
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
        if let Some(end) = after_fence.find("```") {
            let candidate = after_fence[..end].trim();
            if !candidate.is_empty() {
                return Some(candidate.to_string());
            }
        }
    }

    let first = trimmed.find('{')?;
    let last = trimmed.rfind('}')?;
    if last > first {
        Some(trimmed[first..=last].to_string())
    } else {
        None
    }
}

#[async_trait]
impl Structurer for RemoteStructurer {
    async fn structure(&self, path: &Path, _mime: &str) -> ProviderResult<StructureResult> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Ok(StructureResult::Unsupported {
                reason: format!("extension \".{extension}\" is not supported by the remote structurer"),
            });
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                return Ok(StructureResult::Failed {
                    reason: format!("could not read file: {err}"),
                });
            }
        };

        let raw_text = match self.extractor.extract(&extension, &bytes) {
            Ok(text) => text,
            Err(reason) => {
                return Ok(StructureResult::Failed {
                    reason: format!("could not extract text: {reason}"),
                });
            }
        };

        if raw_text.trim().is_empty() {
            return Ok(StructureResult::Failed {
                reason: "no extractable text".to_string(),
            });
        }

        let segments = self.segment(&raw_text);
        tracing::debug!(
            path = %path.display(),
            segments = segments.len(),
            "structuring document with remote provider"
        );
        let mut chunks = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            let prompt = format!(
                "extension: {extension}\nsegment {index} of {total}\n\n{segment}",
                total = segments.len(),
            );

            let model_output = match self.call_model(&prompt).await {
                Ok(output) => output,
                Err(err) => {
                    tracing::warn!(segment = index, %err, "remote structuring call failed");
                    return Ok(StructureResult::Failed {
                        reason: format!(
                            "Structured extraction failed (provider=remote, model={}): {err}",
                            self.config.model_name
                        ),
                    });
                }
            };

            match self.parse_chunks(&model_output, index, &extension) {
                Ok(mut segment_chunks) => chunks.append(&mut segment_chunks),
                Err(err) => {
                    return Ok(StructureResult::Failed {
                        reason: format!(
                            "Structured extraction failed (provider=remote, model={}): {err}",
                            self.config.model_name
                        ),
                    });
                }
            }
        }

        Ok(StructureResult::Structured { chunks })
    }

    fn id(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestor_config::StructurerConfig;

    struct FailingExtractor;

    impl TextExtractor for FailingExtractor {
        fn extract(&self, _extension: &str, _bytes: &[u8]) -> Result<String, String> {
            Err("simulated extraction failure".to_string())
        }
    }

    #[tokio::test]
    async fn unsupported_extension_never_reaches_the_extractor() {
        let structurer = RemoteStructurer::new(StructurerConfig::from_env()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.exe");
        std::fs::write(&path, b"irrelevant").unwrap();

        let result = structurer
            .structure(&path, "application/octet-stream")
            .await
            .unwrap();
        assert!(matches!(result, StructureResult::Unsupported { .. }));
    }

    #[tokio::test]
    async fn extraction_failure_surfaces_as_structure_failed_without_a_real_pdf() {
        let structurer =
            RemoteStructurer::with_extractor(StructurerConfig::from_env(), Arc::new(FailingExtractor)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"not actually a pdf").unwrap();

        let result = structurer.structure(&path, "application/pdf").await.unwrap();
        match result {
            StructureResult::Failed { reason } => assert!(reason.contains("simulated extraction failure")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
