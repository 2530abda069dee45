//! # lembar-ocr
//!
//! An HTTP service that turns an uploaded image or PDF into text and a short
//! AI-written summary. OCR and PDF rasterisation are delegated to the
//! standard external tools (`tesseract`, `pdftoppm`); analysis is a single
//! bounded call to a locally-hosted language model (an Ollama-style
//! `/api/generate` endpoint).
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Validate  extension allow-list + magic-number check
//!  ├─ 2. Extract   pdftoppm → one PNG per page (images pass through)
//!  ├─ 3. Recognise tesseract per page, sequential, `--- Page N ---` headers
//!  ├─ 4. Cleanup   upload + page images removed on every path
//!  ├─ 5. Analyse   best-effort explanation/summary from the local model
//!  └─ 6. Respond   JSON: text + analysis + metadata
//! ```
//!
//! Recognition failures are fatal to a request; analysis failures never are.
//! They degrade to a documented fallback pair so the recognised text is
//! always returned.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lembar_ocr::{OcrPipeline, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_env();
//!     let pipeline = Arc::new(OcrPipeline::new(config)?);
//!     lembar_ocr::server::start_server(pipeline).await?;
//!     Ok(())
//! }
//! ```
//!
//! External tools are injectable: [`pipeline::extract::Rasterizer`] and
//! [`pipeline::ocr::OcrEngine`] let tests (or embedders with different
//! binaries) run the full orchestration without `pdftoppm`/`tesseract`
//! installed.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::ServerConfig;
pub use error::LembarError;
pub use output::{Analysis, UploadMetadata, UploadOutcome};
pub use process::{OcrPipeline, StoredUpload};
