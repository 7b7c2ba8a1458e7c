//! HTTP OCR sidecar provider.
//!
//! Posts the PDF bytes to an external OCR service that renders each page
//! at three orientations and returns one text candidate per rotation.
//! Configured via the `OCR_SIDECAR_URL` environment variable; when unset
//! the fallback is disabled and empty documents fail outright.

use super::{OcrPage, OcrProvider, OcrResult};
use serde::Deserialize;

/// Sidecar response (private deserialization types).
#[derive(Debug, Deserialize)]
struct SidecarResponse {
    pages: Vec<SidecarPage>,
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct SidecarPage {
    page_num: u32,
    rotations: Vec<String>,
}

pub struct SidecarProvider {
    url: String,
    client: reqwest::Client,
}

impl SidecarProvider {
    /// Builds the provider from `OCR_SIDECAR_URL`, or `None` when unset.
    pub fn from_env(client: reqwest::Client) -> Option<Self> {
        let url = std::env::var("OCR_SIDECAR_URL").ok()?;
        Some(Self { url, client })
    }
}

#[async_trait::async_trait]
impl OcrProvider for SidecarProvider {
    fn name(&self) -> &str {
        "sidecar"
    }

    async fn process(&self, filename: &str, data: &[u8]) -> anyhow::Result<OcrResult> {
        use reqwest::multipart::{Form, Part};

        let part = Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;

        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/ocr", self.url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OCR sidecar error ({}): {}", status, error_text);
        }

        let body = response.text().await?;
        let parsed: SidecarResponse = serde_json::from_str(&body)?;

        Ok(OcrResult {
            pages: parsed
                .pages
                .into_iter()
                .map(|p| OcrPage {
                    page_num: p.page_num,
                    rotations: p.rotations,
                })
                .collect(),
            total_pages: parsed.total_pages,
            provider_name: "sidecar".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_body_parses_per_rotation_candidates() {
        let body = r#"{
            "pages": [
                {"page_num": 1, "rotations": ["dose 600 mg", "esod gm"]}
            ],
            "total_pages": 1
        }"#;
        let parsed: SidecarResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.total_pages, 1);
        assert_eq!(parsed.pages[0].page_num, 1);
        assert_eq!(parsed.pages[0].rotations.len(), 2);
    }
}
