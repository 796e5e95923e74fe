//! Text extraction from raw file bytes, kept separate from `RemoteStructurer`'s
//! HTTP plumbing so it can be exercised against synthetic bytes instead of real
//! PDF/DOCX fixtures on disk.

/// Extracts a document's plain text given its lowercase extension and raw bytes.
///
/// Plain-text-ish extensions (`txt`, `csv`, `md`, `markdown`, `json`, `xml`,
/// `html`, `htm`) are decoded as UTF-8 directly. `pdf` goes through
/// `pdf-extract`; `docx`/`doc` through `docx-rs`'s paragraph-run walk. Any
/// other extension falls back to UTF-8 decoding.
pub fn extract_text(extension: &str, bytes: &[u8]) -> Result<String, String> {
    match extension {
        "pdf" => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|err| format!("pdf extraction failed: {err}"))
        }
        "docx" | "doc" => extract_docx(bytes),
        _ => String::from_utf8(bytes.to_vec()).map_err(|err| format!("not valid UTF-8 text: {err}")),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let doc = docx_rs::read_docx(bytes).map_err(|err| format!("docx parse failed: {err}"))?;

    let mut content = String::new();
    for child in doc.document.children {
        let docx_rs::DocumentChild::Paragraph(paragraph) = child else {
            continue;
        };
        for child in paragraph.children {
            let docx_rs::ParagraphChild::Run(run) = child else {
                continue;
            };
            for child in run.children {
                if let docx_rs::RunChild::Text(text) = child {
                    content.push_str(&text.text);
                }
            }
        }
        content.push('\n');
    }
    Ok(content)
}

/// Trait seam over [`extract_text`] so `RemoteStructurer` can take a fake
/// extractor in tests, never touching the filesystem or a real PDF/DOCX parser.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, extension: &str, bytes: &[u8]) -> Result<String, String>;
}

/// Production extractor: delegates straight to [`extract_text`].
pub struct DefaultTextExtractor;

impl TextExtractor for DefaultTextExtractor {
    fn extract(&self, extension: &str, bytes: &[u8]) -> Result<String, String> {
        extract_text(extension, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_text_extensions_as_utf8() {
        assert_eq!(extract_text("txt", b"hello world").unwrap(), "hello world");
        assert_eq!(extract_text("csv", b"a,b\n1,2").unwrap(), "a,b\n1,2");
    }

    #[test]
    fn rejects_non_utf8_plain_text() {
        assert!(extract_text("txt", &[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn rejects_garbage_pdf_bytes() {
        assert!(extract_text("pdf", b"not a real pdf").is_err());
    }

    #[test]
    fn rejects_garbage_docx_bytes() {
        assert!(extract_text("docx", b"not a real docx").is_err());
    }

    #[test]
    fn default_extractor_delegates_to_extract_text() {
        let extractor = DefaultTextExtractor;
        assert_eq!(extractor.extract("txt", b"hi").unwrap(), "hi");
    }
}
