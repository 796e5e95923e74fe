//! Reference structurer: fixed rules for CSV and Markdown, no model backend required.
//! Used when no remote provider is configured, and as the fixture for tests.

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;

use crate::error::ProviderResult;
use crate::traits::{StructuredChunk, Structurer, StructureResult};

pub struct DeterministicStructurer;

impl DeterministicStructurer {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for DeterministicStructurer {
    fn default() -> Self {
        Self::new()
    }
}

fn structure_csv(content: &str) -> StructureResult {
    let chunks = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| StructuredChunk {
            text: line.replace(',', " | "),
            metadata: Some(json!({"source": "csv-row", "row": i + 1})),
        })
        .collect();

    StructureResult::Structured { chunks }
}

fn structure_markdown(content: &str) -> StructureResult {
    let normalized = content.replace("\r\n", "\n");
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in normalized.split('\n') {
        if line.starts_with('#') && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    let chunks = blocks
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .enumerate()
        .map(|(i, text)| StructuredChunk {
            text,
            metadata: Some(json!({"source": "markdown-block", "block": i + 1})),
        })
        .collect();

    StructureResult::Structured { chunks }
}

#[async_trait]
impl Structurer for DeterministicStructurer {
    async fn structure(&self, path: &Path, _mime: &str) -> ProviderResult<StructureResult> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let result = match extension.as_str() {
            "csv" => {
                let content = tokio::fs::read_to_string(path).await?;
                structure_csv(&content)
            }
            "md" | "markdown" => {
                let content = tokio::fs::read_to_string(path).await?;
                structure_markdown(&content)
            }
            other => StructureResult::Unsupported {
                reason: format!("no deterministic structurer for extension \".{other}\""),
            },
        };

        Ok(result)
    }

    fn id(&self) -> &str {
        "deterministic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_splits_rows_and_replaces_commas() {
        let StructureResult::Structured { chunks } = structure_csv("a,b\n1,2\n\n3,4") else {
            panic!("expected structured result");
        };
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "a | b");
        assert_eq!(chunks[2].text, "3 | 4");
    }

    #[test]
    fn markdown_splits_on_headings() {
        let StructureResult::Structured { chunks } =
            structure_markdown("# A\ntext\n# B\ntext2")
        else {
            panic!("expected structured result");
        };
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "# A\ntext");
        assert_eq!(chunks[1].text, "# B\ntext2");
    }
}
