//! Request handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use chrono::{SecondsFormat, Utc};

use super::models::{PingResponse, PING_MESSAGE};
use crate::error::LembarError;
use crate::output::UploadOutcome;
use crate::process::{OcrPipeline, StoredUpload};

/// OCR language used when the form omits the `lang` field.
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Health check endpoint.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: PING_MESSAGE.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// `POST /api/upload`: multipart form with `file` (required) and `lang`
/// (optional).
///
/// The file field is written to the configured upload directory under a
/// unique name before the pipeline runs; from that point on the pipeline
/// owns the file's lifecycle and removes it on every outcome.
pub async fn upload(
    State(pipeline): State<Arc<OcrPipeline>>,
    mut multipart: Multipart,
) -> Result<Json<UploadOutcome>, LembarError> {
    let mut lang = DEFAULT_OCR_LANGUAGE.to_string();
    let mut stored: Option<StoredUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| LembarError::Internal(e.to_string()))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| LembarError::Internal(e.to_string()))?;

                let path = unique_upload_path(&pipeline.config().upload_dir, &original_name);
                tokio::fs::write(&path, &data).await?;
                stored = Some(StoredUpload {
                    path,
                    original_name,
                    size: data.len() as u64,
                });
            }
            "lang" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| LembarError::Internal(e.to_string()))?;
                if !value.trim().is_empty() {
                    lang = value.trim().to_string();
                }
            }
            _ => {}
        }
    }

    let upload = stored.ok_or(LembarError::NoFile)?;
    let outcome = pipeline.process_upload(upload, &lang).await?;
    Ok(Json(outcome))
}

/// Unique on-disk name for one upload: epoch millis + the sanitised original
/// name. Concurrent requests therefore never collide on the shared upload
/// directory.
fn unique_upload_path(dir: &Path, original_name: &str) -> PathBuf {
    let millis = Utc::now().timestamp_millis();
    dir.join(format!("{millis}-{}", sanitize_file_name(original_name)))
}

/// Strip any path components a client smuggled into the declared filename.
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    base.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_components_are_stripped() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("scan.pdf"), "scan.pdf");
    }

    #[test]
    fn upload_paths_stay_inside_the_directory() {
        let p = unique_upload_path(Path::new("/tmp/uploads"), "../escape.pdf");
        assert!(p.starts_with("/tmp/uploads"));
        assert!(p.to_string_lossy().ends_with("-escape.pdf"));
    }
}
