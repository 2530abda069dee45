//! Wire types for the HTTP surface.
//!
//! The success body is [`crate::output::UploadOutcome`] serialised directly;
//! only the health check and the error shape live here.

use serde::{Deserialize, Serialize};

/// Fixed health-check message.
pub const PING_MESSAGE: &str = "OCR Backend is running!";

/// Body of `GET /ping`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
    pub timestamp: String,
}

/// JSON error body: always an `error` field, plus the captured tool
/// diagnostic as `details` when one exists. Never a stack trace.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
