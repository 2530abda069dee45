//! Error types for the lembar-ocr service.
//!
//! One enum covers every *fatal* failure of the upload pipeline. Analysis
//! failures are deliberately absent: the inference call is best-effort and
//! degrades to a fallback [`crate::output::Analysis`] pair instead of
//! erroring (see [`crate::pipeline::analyze`]).
//!
//! Variants carry the diagnostic a caller is allowed to see. External-tool
//! stderr is captured into `detail` fields; nothing else (no paths from
//! other requests, no stack traces) leaks into responses.

use thiserror::Error;

/// Extensions accepted by the upload validator, in the order they are
/// reported to callers.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".pdf"];

/// All fatal errors returned by the upload pipeline.
///
/// The first six variants are client errors (HTTP 400): the request itself
/// was unprocessable. [`OcrFailed`](LembarError::OcrFailed) and
/// [`Internal`](LembarError::Internal) are server errors (HTTP 500).
#[derive(Debug, Error)]
pub enum LembarError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The multipart request carried no `file` field.
    #[error("No file uploaded")]
    NoFile,

    /// The declared extension is outside the allow-list. The file content is
    /// never inspected in this case.
    #[error("File type {extension} not supported. Allowed: {allowed}", allowed = ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedType { extension: String },

    /// The extension is allowed but the leading bytes do not match any known
    /// signature for that family (spoofed extension, truncated file).
    #[error("File is not a valid {expected}: {detail}")]
    InvalidContent { expected: &'static str, detail: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The external rasterizer invocation itself failed; corrupted,
    /// encrypted, or unsupported PDFs end up here.
    #[error("PDF processing failed. The PDF file may be corrupted, password-protected, or in an unsupported format.")]
    ConversionFailed { detail: String },

    /// The rasterizer produced more diagnostic output than the per-request
    /// capture bound allows. Fatal for this request only.
    #[error("PDF processing produced more than {limit} bytes of tool output")]
    BufferExceeded { limit: usize },

    /// The rasterizer ran successfully but wrote no page images.
    #[error("No pages could be extracted from the PDF file")]
    NoPagesExtracted,

    // ── Recognition errors ────────────────────────────────────────────────
    /// The OCR engine failed on some page. Aborts the whole request; no
    /// partial text is returned.
    #[error("OCR processing failed")]
    OcrFailed { detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (I/O on temporary storage, join failures).
    #[error("OCR processing failed")]
    Internal(String),
}

impl LembarError {
    /// True for errors the client caused (HTTP 400 class).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LembarError::OcrFailed { .. } | LembarError::Internal(_))
    }

    /// The captured tool diagnostic for this error, when one exists.
    /// Surfaced as the `details` field of the JSON error body.
    pub fn detail(&self) -> Option<&str> {
        match self {
            LembarError::ConversionFailed { detail }
            | LembarError::OcrFailed { detail }
            | LembarError::InvalidContent { detail, .. } => Some(detail),
            LembarError::Internal(detail) => Some(detail),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LembarError {
    fn from(err: std::io::Error) -> Self {
        LembarError::Internal(err.to_string())
    }
}
