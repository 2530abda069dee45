//! Upload validation: declared extension and content signature.
//!
//! The declared extension selects the signature family; the leading bytes
//! must then match a known magic number for that family. Checking bytes as
//! well as the name protects the expensive stages from spoofed extensions:
//! a `.pdf` that does not start with `%PDF` never reaches the rasterizer.

use std::path::Path;

use crate::error::{LembarError, ALLOWED_EXTENSIONS};

/// What family an upload belongs to, decided by its declared extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Pdf,
    Image,
}

/// Lower-cased declared extension of `filename`, with the leading dot
/// (`".pdf"`), or an empty string when there is none.
pub fn declared_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Check the declared extension against the allow-list.
///
/// This runs before any content is read; a disallowed extension is rejected
/// without inspecting a single byte.
pub fn check_extension(filename: &str) -> Result<UploadKind, LembarError> {
    let ext = declared_extension(filename);
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(LembarError::UnsupportedType { extension: ext });
    }
    if ext == ".pdf" {
        Ok(UploadKind::Pdf)
    } else {
        Ok(UploadKind::Image)
    }
}

/// Check the leading bytes of the upload against the signature family its
/// extension declared.
///
/// PDF requires the `%PDF` header. Images accept JPEG, PNG, GIF, or BMP
/// magic numbers; TIFF carries an allow-listed extension but no accepted
/// signature, so a TIFF body fails here.
pub fn check_signature(kind: UploadKind, leading: &[u8]) -> Result<(), LembarError> {
    match kind {
        UploadKind::Pdf => {
            if leading.starts_with(b"%PDF") {
                Ok(())
            } else {
                Err(LembarError::InvalidContent {
                    expected: "PDF",
                    detail: "missing %PDF header".into(),
                })
            }
        }
        UploadKind::Image => {
            if is_known_image(leading) {
                Ok(())
            } else {
                Err(LembarError::InvalidContent {
                    expected: "image",
                    detail: "unrecognised image signature".into(),
                })
            }
        }
    }
}

fn is_known_image(b: &[u8]) -> bool {
    b.starts_with(&[0xFF, 0xD8, 0xFF])          // JPEG
        || b.starts_with(&[0x89, 0x50, 0x4E, 0x47]) // PNG
        || b.starts_with(&[0x47, 0x49, 0x46])       // GIF
        || b.starts_with(&[0x42, 0x4D])             // BMP
}
