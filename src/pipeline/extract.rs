//! Page extraction: one raster image per logical page.
//!
//! Images are their own single page. PDFs go through an external rasterizer
//! that writes `<prefix>-<N>.png` files next to the upload; the produced
//! files are collected and sorted lexicographically, which equals page order
//! because the tool zero-pads page numbers in its output names.
//!
//! The rasterizer is an injectable capability so the pipeline is testable
//! without the binary installed; tests substitute an implementation that
//! writes files directly.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::exec::{self, ExecError};
use super::validate::UploadKind;
use crate::error::LembarError;

/// Suffix appended to the upload path to form the rasterizer output prefix.
pub const PAGE_PREFIX_SUFFIX: &str = "-page";

/// Capability: turn a PDF into per-page images on disk.
///
/// Implementations write one image per page under `out_prefix` (the produced
/// names must share the prefix, carry a sortable page number, and end in
/// `.png`). They do not collect or order the results; that stays in
/// [`extract_pages`] so it is exercised uniformly for every implementation.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, pdf: &Path, out_prefix: &Path) -> Result<(), LembarError>;
}

/// Default rasterizer: the `pdftoppm` CLI.
///
/// Invoked as `pdftoppm -png <pdf> <prefix>`; the tool emits
/// `<prefix>-01.png`, `<prefix>-02.png`, … with zero-padded page numbers.
pub struct Pdftoppm {
    output_limit: usize,
}

impl Pdftoppm {
    /// `output_limit` bounds captured stdout+stderr for one invocation.
    pub fn new(output_limit: usize) -> Self {
        Self { output_limit }
    }
}

#[async_trait]
impl Rasterizer for Pdftoppm {
    async fn rasterize(&self, pdf: &Path, out_prefix: &Path) -> Result<(), LembarError> {
        let args: Vec<OsString> = vec![
            "-png".into(),
            pdf.as_os_str().to_os_string(),
            out_prefix.as_os_str().to_os_string(),
        ];
        let arg_refs: Vec<&std::ffi::OsStr> = args.iter().map(OsString::as_os_str).collect();

        match exec::run_tool("pdftoppm", &arg_refs, self.output_limit).await {
            Ok(_) => Ok(()),
            Err(ExecError::BufferExceeded { limit }) => {
                Err(LembarError::BufferExceeded { limit })
            }
            Err(ExecError::Io(e)) => Err(LembarError::Internal(e.to_string())),
            Err(err @ (ExecError::Spawn(_) | ExecError::Failed { .. })) => {
                Err(LembarError::ConversionFailed {
                    detail: err.to_string(),
                })
            }
        }
    }
}

/// Produce the ordered page-image list for a validated upload.
///
/// Images yield a single-element list holding the original path. PDFs are
/// rasterized, then every `<prefix>*.png` sibling is collected and sorted;
/// an empty result is [`LembarError::NoPagesExtracted`].
pub async fn extract_pages(
    kind: UploadKind,
    upload_path: &Path,
    rasterizer: &dyn Rasterizer,
) -> Result<Vec<PathBuf>, LembarError> {
    match kind {
        UploadKind::Image => Ok(vec![upload_path.to_path_buf()]),
        UploadKind::Pdf => {
            let prefix = page_prefix(upload_path);
            rasterizer.rasterize(upload_path, &prefix).await?;

            let pages = collect_page_images(upload_path)?;
            debug!("rasterizer produced {} page image(s)", pages.len());
            if pages.is_empty() {
                return Err(LembarError::NoPagesExtracted);
            }
            Ok(pages)
        }
    }
}

/// The rasterizer output prefix for an upload: `<upload-path>-page`.
pub fn page_prefix(upload_path: &Path) -> PathBuf {
    let mut name = upload_path.as_os_str().to_os_string();
    name.push(PAGE_PREFIX_SUFFIX);
    PathBuf::from(name)
}

/// Collect `<upload-name>-page*.png` siblings of the upload, sorted by name.
fn collect_page_images(upload_path: &Path) -> Result<Vec<PathBuf>, LembarError> {
    let dir = upload_path
        .parent()
        .ok_or_else(|| LembarError::Internal("upload path has no parent directory".into()))?;
    let prefix_name = {
        let mut n = upload_path
            .file_name()
            .ok_or_else(|| LembarError::Internal("upload path has no file name".into()))?
            .to_os_string();
        n.push(PAGE_PREFIX_SUFFIX);
        n.to_string_lossy().into_owned()
    };

    let mut pages = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix_name) && name.ends_with(".png") {
            pages.push(entry.path());
        }
    }
    pages.sort();
    Ok(pages)
}
