//! Result types returned by the upload pipeline.
//!
//! Everything here is request-scoped and serialisable; nothing persists
//! beyond the HTTP response it is embedded in.

use serde::{Deserialize, Serialize};

/// The explanation/summary pair derived from a model completion, or the
/// documented fallback pair when the inference call or parsing failed.
///
/// Field names are the wire names (`penjelasan`, `ringkasan`); they appear
/// verbatim in the JSON response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Short explanation of what the document is about.
    pub penjelasan: String,
    /// Bulleted summary of the document's content.
    pub ringkasan: String,
}

/// Request metadata echoed back alongside the recognised text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Original (client-declared) filename.
    pub filename: String,
    /// Uploaded size in bytes.
    #[serde(rename = "fileSize")]
    pub file_size: u64,
    /// OCR language code the recognition ran with.
    pub language: String,
    /// Number of pages recognised (1 for plain images).
    pub pages: usize,
    /// ISO-8601 completion timestamp.
    pub timestamp: String,
}

/// Successful outcome of one upload request.
///
/// `analysis` is `None` when the recognised text was too short to analyse.
/// It is never `None` because of an inference failure: those degrade to a
/// fallback [`Analysis`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    /// Concatenated per-page text, each block under a `--- Page N ---` header.
    pub text: String,
    /// Explanation/summary pair, or `None` for noise-length text.
    pub analysis: Option<Analysis>,
    /// Request metadata.
    pub metadata: UploadMetadata,
}
