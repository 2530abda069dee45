//! OCR adapter: recognise each page image, in order.
//!
//! Recognition is strictly sequential: page counts are small and the engine
//! is CPU-bound per invocation, so fan-out would only reorder failures. A
//! failure on any page aborts the whole request; partial text is never
//! returned.

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::exec::{self, ExecError};
use crate::error::LembarError;

/// Tesseract OCR engine mode: LSTM only. General-document constant.
pub const OCR_ENGINE_MODE: u8 = 1;
/// Tesseract page segmentation mode: fully automatic. General-document constant.
pub const PAGE_SEGMENTATION_MODE: u8 = 3;

/// Capability: image path + language code → recognised text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path, lang: &str) -> Result<String, LembarError>;
}

/// Default engine: the `tesseract` CLI.
///
/// Invoked as `tesseract <image> stdout -l <lang> --oem 1 --psm 3`. The
/// recognised text arrives on stdout under the shared capture bound.
pub struct Tesseract {
    output_limit: usize,
}

impl Tesseract {
    pub fn new(output_limit: usize) -> Self {
        Self { output_limit }
    }
}

#[async_trait]
impl OcrEngine for Tesseract {
    async fn recognize(&self, image: &Path, lang: &str) -> Result<String, LembarError> {
        let args: Vec<OsString> = vec![
            image.as_os_str().to_os_string(),
            "stdout".into(),
            "-l".into(),
            lang.into(),
            "--oem".into(),
            OCR_ENGINE_MODE.to_string().into(),
            "--psm".into(),
            PAGE_SEGMENTATION_MODE.to_string().into(),
        ];
        let arg_refs: Vec<&std::ffi::OsStr> = args.iter().map(OsString::as_os_str).collect();

        match exec::run_tool("tesseract", &arg_refs, self.output_limit).await {
            Ok(out) => Ok(out.stdout),
            Err(err @ (ExecError::Spawn(_)
            | ExecError::Failed { .. }
            | ExecError::BufferExceeded { .. })) => Err(LembarError::OcrFailed {
                detail: err.to_string(),
            }),
            Err(ExecError::Io(e)) => Err(LembarError::Internal(e.to_string())),
        }
    }
}

/// Render the header that precedes each page's text block.
pub fn page_header(page_number: usize) -> String {
    format!("--- Page {page_number} ---")
}

/// Recognition result for a whole document.
///
/// `text` is what the caller returns to the client; `content_chars` counts
/// only what the engine actually recognised (headers excluded, trimmed per
/// page), so downstream noise checks are not fooled by the headers
/// themselves.
#[derive(Debug, Clone)]
pub struct RecognizedDocument {
    /// Concatenated page blocks, each under a `--- Page N ---` header.
    pub text: String,
    /// Recognised characters across all pages, whitespace-trimmed per page.
    pub content_chars: usize,
}

/// Recognise every page in order and concatenate the results.
///
/// Each block is `--- Page N ---\n<text>\n\n`, with N starting at 1 in list
/// order. The first failing page propagates immediately.
pub async fn recognize_pages(
    pages: &[std::path::PathBuf],
    lang: &str,
    engine: &dyn OcrEngine,
) -> Result<RecognizedDocument, LembarError> {
    let mut text = String::new();
    let mut content_chars = 0;
    for (idx, page) in pages.iter().enumerate() {
        let page_number = idx + 1;
        debug!("recognising page {page_number}/{}", pages.len());
        let recognised = engine.recognize(page, lang).await?;
        content_chars += recognised.trim().chars().count();
        text.push_str(&page_header(page_number));
        text.push('\n');
        text.push_str(&recognised);
        text.push_str("\n\n");
    }
    Ok(RecognizedDocument {
        text,
        content_chars,
    })
}
