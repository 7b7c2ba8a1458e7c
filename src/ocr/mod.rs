//! OCR fallback boundary for scanned rotas with no embedded text layer.
//!
//! Defines the [`OcrProvider`] trait so an external OCR backend can be
//! plugged in behind the text-acquisition step. Providers return one text
//! candidate per rotation attempt for each page; [`OcrResult::best_text`]
//! votes on the best-oriented candidate per page.

pub mod rotation;
pub mod sidecar;

/// Per-page OCR output (always 1-indexed). `rotations` holds one text
/// candidate per attempted page orientation, in the order the backend
/// tried them (0, 90, 270 degrees).
#[derive(Debug, Clone)]
pub struct OcrPage {
    pub page_num: u32,
    pub rotations: Vec<String>,
}

/// Unified OCR result returned by a provider.
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub pages: Vec<OcrPage>,
    pub total_pages: u32,
    pub provider_name: String,
}

impl OcrResult {
    /// Best-oriented text of all pages in order, one rotation vote per page.
    pub fn best_text(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            let candidates: Vec<&str> = page.rotations.iter().map(String::as_str).collect();
            out.push_str(rotation::pick_best_rotation(&candidates));
            out.push('\n');
        }
        out
    }
}

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn process(&self, filename: &str, data: &[u8]) -> anyhow::Result<OcrResult>;
}
