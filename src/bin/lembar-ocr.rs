//! Server binary for lembar-ocr.
//!
//! A thin shim over the library crate that maps CLI flags (with environment
//! fallbacks) to a `ServerConfig` and starts the HTTP server.

use anyhow::Result;
use clap::Parser;
use lembar_ocr::{OcrPipeline, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lembar-ocr")]
#[command(about = "OCR upload service with local-LLM document analysis")]
#[command(version)]
struct Args {
    /// Port the HTTP server listens on.
    #[arg(long, env = "PORT", default_value_t = lembar_ocr::config::DEFAULT_PORT)]
    port: u16,

    /// Inference endpoint URL (Ollama-style /api/generate).
    #[arg(long, env = "LLAMA_API_URL", default_value = lembar_ocr::config::DEFAULT_INFERENCE_URL)]
    llama_api_url: String,

    /// Inference model identifier.
    #[arg(long, env = "LLAMA_MODEL", default_value = lembar_ocr::config::DEFAULT_INFERENCE_MODEL)]
    llama_model: String,

    /// Directory for uploads and derived page images.
    #[arg(long, env = "UPLOAD_DIR", default_value = lembar_ocr::config::DEFAULT_UPLOAD_DIR)]
    upload_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lembar_ocr=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = ServerConfig::builder()
        .port(args.port)
        .inference_url(args.llama_api_url)
        .inference_model(args.llama_model)
        .upload_dir(args.upload_dir)
        .build()?;

    let pipeline = Arc::new(OcrPipeline::new(config)?);
    lembar_ocr::server::start_server(pipeline).await?;

    Ok(())
}
