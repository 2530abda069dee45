//! Request orchestration: one upload through the whole pipeline.
//!
//! The stages run strictly in sequence (validate, extract, recognise,
//! analyse) and every temporary file created along the way is removed on
//! every exit path. Cleanup is the one discipline that must hold no matter
//! which stage fails: [`TempArtifacts`] tracks the stored upload and all
//! derived page images, removes them at a single point after recognition
//! (success or failure), and carries a `Drop` backstop for panics. Deleting
//! an already-missing file is not an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::LembarError;
use crate::output::{UploadMetadata, UploadOutcome};
use crate::pipeline::analyze::Analyzer;
use crate::pipeline::extract::{self, Pdftoppm, Rasterizer};
use crate::pipeline::ocr::{self, OcrEngine, Tesseract};
use crate::pipeline::validate::{self, UploadKind};

/// An upload already written to temporary storage by the transport layer.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Where the bytes were stored (uniquely named per request).
    pub path: PathBuf,
    /// Client-declared filename, used for extension validation and metadata.
    pub original_name: String,
    /// Uploaded size in bytes.
    pub size: u64,
}

/// The assembled pipeline: configuration plus the two external-tool
/// capabilities and the inference client.
pub struct OcrPipeline {
    config: ServerConfig,
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    analyzer: Analyzer,
}

impl OcrPipeline {
    /// Pipeline with the real external tools (`pdftoppm`, `tesseract`).
    pub fn new(config: ServerConfig) -> Result<Self, LembarError> {
        let rasterizer = Arc::new(Pdftoppm::new(config.command_output_limit));
        let ocr = Arc::new(Tesseract::new(config.command_output_limit));
        Self::with_engines(config, rasterizer, ocr)
    }

    /// Pipeline with injected capabilities. Tests use this to run the full
    /// orchestration without either binary installed.
    pub fn with_engines(
        config: ServerConfig,
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Result<Self, LembarError> {
        let analyzer = Analyzer::new(&config)?;
        Ok(Self {
            config,
            rasterizer,
            ocr,
            analyzer,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run one stored upload through validate → extract → recognise →
    /// analyse and assemble the response value.
    ///
    /// On return, `Ok` or `Err`, the stored upload and every derived page
    /// image have been removed from storage.
    pub async fn process_upload(
        &self,
        upload: StoredUpload,
        lang: &str,
    ) -> Result<UploadOutcome, LembarError> {
        info!(file = %upload.original_name, size = upload.size, %lang, "processing upload");

        let mut artifacts = TempArtifacts::new();
        artifacts.track_file(upload.path.clone());

        let recognised = self.run_recognition(&upload, lang, &mut artifacts).await;

        // Single cleanup point for every outcome. The inference stage only
        // needs the recognised text, so the files go first.
        artifacts.remove_all().await;

        let (document, page_count) = recognised?;

        // ── Analyse (best-effort, never fails the request) ───────────────
        let analysis = self.analyzer.analyze(&document).await;

        // ── Assemble ─────────────────────────────────────────────────────
        let outcome = UploadOutcome {
            text: document.text,
            analysis,
            metadata: UploadMetadata {
                filename: upload.original_name,
                file_size: upload.size,
                language: lang.to_string(),
                pages: page_count,
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        };
        info!(pages = page_count, "upload processed");
        Ok(outcome)
    }

    /// The fallible file-touching stages, separated out so the caller has
    /// exactly one cleanup point.
    async fn run_recognition(
        &self,
        upload: &StoredUpload,
        lang: &str,
        artifacts: &mut TempArtifacts,
    ) -> Result<(ocr::RecognizedDocument, usize), LembarError> {
        // ── Validate ─────────────────────────────────────────────────────
        let kind = validate::check_extension(&upload.original_name)?;
        let leading = read_leading_bytes(&upload.path).await?;
        validate::check_signature(kind, &leading)?;
        debug!(?kind, "upload validated");

        // ── Extract pages ────────────────────────────────────────────────
        if kind == UploadKind::Pdf {
            // Track by prefix before rasterizing: a failing tool may still
            // have written some page images.
            artifacts.track_prefix(extract::page_prefix(&upload.path));
        }
        let pages = extract::extract_pages(kind, &upload.path, self.rasterizer.as_ref()).await?;
        info!(pages = pages.len(), "pages extracted");

        // ── Recognise ────────────────────────────────────────────────────
        let document = ocr::recognize_pages(&pages, lang, self.ocr.as_ref()).await?;
        Ok((document, pages.len()))
    }
}

/// Read the first bytes of a file for the signature check.
async fn read_leading_bytes(path: &Path) -> Result<Vec<u8>, LembarError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(buf[..filled].to_vec())
}

// ── Cleanup guard ────────────────────────────────────────────────────────

/// Tracks request-scoped files for guaranteed removal.
///
/// Exact paths cover the stored upload and anything else known by name;
/// prefixes cover rasterizer output, where the produced set is only known
/// by its naming scheme. [`remove_all`](Self::remove_all) is idempotent and
/// treats missing files as already done. If the request unwinds before the
/// explicit call, `Drop` performs the same removal synchronously.
#[derive(Default)]
pub struct TempArtifacts {
    files: Vec<PathBuf>,
    prefixes: Vec<PathBuf>,
}

impl TempArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track one exact path.
    pub fn track_file(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    /// Track every current and future sibling whose name starts with the
    /// file-name component of `prefix`.
    pub fn track_prefix(&mut self, prefix: PathBuf) {
        self.prefixes.push(prefix);
    }

    /// Remove everything tracked, then forget it. Missing files are fine.
    pub async fn remove_all(&mut self) {
        for path in self.files.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("could not remove {}: {e}", path.display()),
            }
        }
        for prefix in self.prefixes.drain(..) {
            remove_by_prefix(&prefix);
        }
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        for path in self.files.drain(..) {
            let _ = std::fs::remove_file(path);
        }
        for prefix in self.prefixes.drain(..) {
            remove_by_prefix(&prefix);
        }
    }
}

fn remove_by_prefix(prefix: &Path) {
    let (Some(dir), Some(prefix_name)) = (prefix.parent(), prefix.file_name()) else {
        return;
    };
    let prefix_name = prefix_name.to_string_lossy();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with(prefix_name.as_ref())
        {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remove_all_deletes_tracked_files_and_prefix_matches() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("17-doc.pdf");
        let page1 = dir.path().join("17-doc.pdf-page-01.png");
        let page2 = dir.path().join("17-doc.pdf-page-02.png");
        let unrelated = dir.path().join("18-other.pdf");
        for p in [&upload, &page1, &page2, &unrelated] {
            std::fs::write(p, b"x").unwrap();
        }

        let mut artifacts = TempArtifacts::new();
        artifacts.track_file(upload.clone());
        artifacts.track_prefix(extract::page_prefix(&upload));
        artifacts.remove_all().await;

        assert!(!upload.exists());
        assert!(!page1.exists());
        assert!(!page2.exists());
        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn removing_missing_files_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifacts = TempArtifacts::new();
        artifacts.track_file(dir.path().join("never-created.png"));
        artifacts.track_prefix(dir.path().join("no-such-prefix"));
        artifacts.remove_all().await;
        // Second call is a no-op: everything was drained.
        artifacts.remove_all().await;
    }

    #[test]
    fn drop_backstop_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("17-scan.png");
        std::fs::write(&path, b"x").unwrap();
        {
            let mut artifacts = TempArtifacts::new();
            artifacts.track_file(path.clone());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn leading_bytes_of_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny");
        std::fs::write(&path, b"ab").unwrap();
        assert_eq!(read_leading_bytes(&path).await.unwrap(), b"ab");
    }
}
