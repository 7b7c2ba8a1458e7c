//! Document acquisition: turning uploaded bytes into plain text.

use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use lopdf::Document;
use tracing::{debug, info, warn};

use crate::error::ConvertError;
use crate::ocr::OcrProvider;

/// File formats we accept for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Pdf,
    Html,
}

/// Decide the input format from the uploaded filename.
pub fn detect_format(filename: &str) -> Result<InputFormat, ConvertError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok(InputFormat::Pdf),
        "htm" | "html" => Ok(InputFormat::Html),
        other => Err(ConvertError::UnsupportedFormat(other.to_string())),
    }
}

/// Extract text from a PDF, page by page.
///
/// Scanned rotas with no embedded text layer come back empty; callers see
/// that as [`ConvertError::EmptyDocument`] and can fall back to OCR.
pub fn extract_pdf_text(data: &[u8]) -> anyhow::Result<String> {
    let doc = Document::load_from(Cursor::new(data)).context("failed to load PDF")?;

    let mut text = String::new();
    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "loaded PDF");

    for (page_num, _) in pages {
        match doc.extract_text(&[page_num]) {
            Ok(content) => {
                text.push_str(&content);
                text.push('\n');
            }
            Err(e) => warn!(page = page_num, error = %e, "failed to extract page text"),
        }
    }

    if text.trim().is_empty() {
        return Err(ConvertError::EmptyDocument.into());
    }
    Ok(text)
}

/// Extract text from a PDF, routing scanned or unreadable documents through
/// the OCR fallback when a provider is configured.
///
/// Rotation voting happens inside [`crate::ocr::OcrResult::best_text`]; if
/// OCR still yields nothing the document is reported as empty.
pub async fn pdf_text_with_fallback(
    data: &[u8],
    filename: &str,
    ocr: Option<&dyn OcrProvider>,
) -> anyhow::Result<String> {
    let err = match extract_pdf_text(data) {
        Ok(text) => return Ok(text),
        Err(e) => e,
    };

    let Some(provider) = ocr else {
        return Err(err);
    };

    info!(provider = provider.name(), error = %err, "text extraction failed, trying OCR");
    let result = provider.process(filename, data).await?;
    let text = result.best_text();
    if text.trim().is_empty() {
        return Err(ConvertError::EmptyDocument.into());
    }
    Ok(text)
}

/// Decode uploaded HTML bytes, tolerating the Windows-1252 bytes that Word
/// exports commonly contain.
pub fn decode_html(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(s) => s.to_string(),
        Err(_) => data.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_by_extension() {
        assert_eq!(detect_format("rota.pdf").unwrap(), InputFormat::Pdf);
        assert_eq!(detect_format("HROTA448.HTM").unwrap(), InputFormat::Html);
        assert_eq!(detect_format("page.html").unwrap(), InputFormat::Html);
        assert!(matches!(
            detect_format("notes.docx"),
            Err(ConvertError::UnsupportedFormat(e)) if e == "docx"
        ));
        assert!(detect_format("no_extension").is_err());
    }

    #[test]
    fn invalid_pdf_is_an_error() {
        assert!(extract_pdf_text(b"not a pdf").is_err());
    }

    #[test]
    fn latin1_html_decodes_lossily() {
        let bytes = b"dose per m\xb2";
        assert_eq!(decode_html(bytes), "dose per m²");
    }

    struct StubOcr;

    #[async_trait::async_trait]
    impl OcrProvider for StubOcr {
        fn name(&self) -> &str {
            "stub"
        }

        async fn process(&self, _filename: &str, _data: &[u8]) -> anyhow::Result<crate::ocr::OcrResult> {
            Ok(crate::ocr::OcrResult {
                pages: vec![crate::ocr::OcrPage {
                    page_num: 1,
                    rotations: vec![
                        "gibberish".to_string(),
                        "Starting dose 600 mg BD".to_string(),
                    ],
                }],
                total_pages: 1,
                provider_name: "stub".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn unreadable_pdf_falls_back_to_ocr() {
        let text = pdf_text_with_fallback(b"not a pdf", "rota.pdf", Some(&StubOcr))
            .await
            .unwrap();
        assert!(text.contains("Starting dose 600 mg BD"));
    }

    #[tokio::test]
    async fn unreadable_pdf_without_provider_stays_an_error() {
        assert!(pdf_text_with_fallback(b"not a pdf", "rota.pdf", None)
            .await
            .is_err());
    }
}
