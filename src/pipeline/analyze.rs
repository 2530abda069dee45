//! Best-effort document analysis via a local inference endpoint.
//!
//! The adapter is intentionally thin: prompt text lives in
//! [`crate::prompts`], transport is one bounded POST, and the completion is
//! parsed by matching the two section labels the prompt asked for. Free-text
//! completions are brittle (labels may be missing, reordered, or renamed),
//! so parsing never fails hard: every miss substitutes a documented default,
//! and every transport failure maps to a documented fallback pair. Analysis
//! can degrade but can never abort a request that produced valid OCR text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ocr::RecognizedDocument;
use crate::config::ServerConfig;
use crate::error::LembarError;
use crate::output::Analysis;
use crate::prompts;

/// Documents whose recognised content (headers excluded, trimmed) is below
/// this many characters are treated as noise and not analysed at all.
pub const MIN_ANALYSIS_CHARS: usize = 10;

// Sampling parameters sent with every generate request.
const TEMPERATURE: f32 = 0.3;
const TOP_P: f32 = 0.9;
const MAX_TOKENS: u32 = 500;
const NUM_PREDICT: u32 = 500;

// ── Documented fallback strings ──────────────────────────────────────────

/// Explanation used for every transport-level failure.
pub const FALLBACK_EXPLANATION: &str = "Gagal menganalisis dokumen dengan AI";
/// Summary when the endpoint refused the connection (service not running).
pub const FALLBACK_SERVICE_DOWN: &str = "Ollama service tidak berjalan";
/// Summary when the call timed out or the connection was reset.
pub const FALLBACK_TIMEOUT: &str =
    "AI membutuhkan waktu terlalu lama, coba dengan teks yang lebih pendek";
/// Summary for any other transport error or non-2xx response.
pub const FALLBACK_UNAVAILABLE: &str = "Layanan AI tidak tersedia saat ini";

/// Pair returned when the endpoint answered but the completion was empty.
pub const EMPTY_EXPLANATION: &str = "Tidak dapat menganalisis dokumen";
pub const EMPTY_SUMMARY: &str = "Response kosong dari AI";

/// Default explanation when the `Penjelasan:` label is absent from an
/// otherwise non-empty completion.
pub const DEFAULT_EXPLANATION: &str = "Dokumen berhasil dianalisis";

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    num_predict: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_tokens: MAX_TOKENS,
            num_predict: NUM_PREDICT,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

// ── Analyzer ─────────────────────────────────────────────────────────────

/// Client for the local inference endpoint.
///
/// Holds one [`reqwest::Client`] with the configured bounded wait; the call
/// is abandoned when the timeout elapses. No retry is performed.
pub struct Analyzer {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl Analyzer {
    pub fn new(config: &ServerConfig) -> Result<Self, LembarError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.analysis_timeout_secs))
            .build()
            .map_err(|e| LembarError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: config.inference_url.clone(),
            model: config.inference_model.clone(),
        })
    }

    /// Analyse a recognised document, or skip it entirely.
    ///
    /// Returns `None` without touching the network when the recognised
    /// content is under [`MIN_ANALYSIS_CHARS`]; page headers alone never
    /// qualify a document for analysis. Otherwise always returns `Some`:
    /// the pair is either parsed from the completion or one of the
    /// documented fallbacks. The prompt embeds the full headered text.
    pub async fn analyze(&self, document: &RecognizedDocument) -> Option<Analysis> {
        if document.content_chars < MIN_ANALYSIS_CHARS {
            debug!("text too short for analysis, skipping inference call");
            return None;
        }
        Some(self.request_analysis(&document.text).await)
    }

    async fn request_analysis(&self, ocr_text: &str) -> Analysis {
        let truncated = prompts::truncate_for_prompt(ocr_text);
        let prompt = prompts::analysis_prompt(&truncated);
        debug!(model = %self.model, "sending text to inference endpoint");

        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            options: SamplingOptions::default(),
        };

        let response = match self.client.post(&self.url).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("inference request failed: {e}");
                return transport_fallback(&e);
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "inference endpoint returned an error status");
            return Analysis {
                penjelasan: FALLBACK_EXPLANATION.to_string(),
                ringkasan: FALLBACK_UNAVAILABLE.to_string(),
            };
        }

        match response.json::<GenerateResponse>().await {
            Ok(body) => {
                let full = body.response.unwrap_or_default();
                let full = full.trim();
                if full.is_empty() {
                    Analysis {
                        penjelasan: EMPTY_EXPLANATION.to_string(),
                        ringkasan: EMPTY_SUMMARY.to_string(),
                    }
                } else {
                    parse_completion(full)
                }
            }
            Err(e) => {
                warn!("inference response could not be decoded: {e}");
                transport_fallback(&e)
            }
        }
    }
}

// ── Completion parsing ───────────────────────────────────────────────────

static RE_PENJELASAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)penjelasan:\s*(.*?)(?:ringkasan:|\z)").unwrap());
static RE_RINGKASAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)ringkasan:\s*(.*)").unwrap());

/// Extract the explanation/summary pair from a raw completion.
///
/// Everything after `Penjelasan:` up to `Ringkasan:` (or end of text) is the
/// explanation; everything after `Ringkasan:` is the summary. A missing
/// label substitutes its documented default: the model sometimes skips one,
/// and that is a degraded result, not an error.
pub fn parse_completion(full: &str) -> Analysis {
    let penjelasan = RE_PENJELASAN
        .captures(full)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());
    let ringkasan = RE_RINGKASAN
        .captures(full)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| full.to_string());
    Analysis {
        penjelasan,
        ringkasan,
    }
}

/// Map a transport error to its documented fallback pair.
fn transport_fallback(err: &reqwest::Error) -> Analysis {
    let ringkasan = if err.is_timeout() || is_connection_reset(err) {
        FALLBACK_TIMEOUT
    } else if err.is_connect() {
        FALLBACK_SERVICE_DOWN
    } else {
        FALLBACK_UNAVAILABLE
    };
    Analysis {
        penjelasan: FALLBACK_EXPLANATION.to_string(),
        ringkasan: ringkasan.to_string(),
    }
}

/// Walk the source chain looking for an OS-level connection reset.
fn is_connection_reset(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
