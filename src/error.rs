//! Error types for the conversion pipeline.
//!
//! Extraction failures are local and non-fatal (fields fall back to sentinel
//! values); these variants cover the conditions that must be reported to the
//! caller as distinct kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The source document produced no text at all (unreadable or empty
    /// byte stream). Distinct from an extraction that merely misses fields.
    #[error("document contains no extractable text")]
    EmptyDocument,

    #[error("unsupported file type: .{0}")]
    UnsupportedFormat(String),

    /// The only fatal generation-time condition: mandatory human-input
    /// fields are still at their sentinel value.
    #[error("config is missing required fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("DOCX error: {0}")]
    Docx(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
