//! Server configuration.
//!
//! Every knob lives in one [`ServerConfig`] value constructed at startup and
//! passed into the pipeline; there is no ambient global state. Build it via
//! [`ServerConfig::builder()`] for explicit control (tests, embedding) or
//! [`ServerConfig::from_env()`] for the environment-variable surface the
//! service documents.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::LembarError;

/// Default listening port (`PORT`).
pub const DEFAULT_PORT: u16 = 3000;
/// Default inference endpoint (`LLAMA_API_URL`).
pub const DEFAULT_INFERENCE_URL: &str = "http://localhost:11434/api/generate";
/// Default inference model identifier (`LLAMA_MODEL`).
pub const DEFAULT_INFERENCE_MODEL: &str = "llama3.2:3b";
/// Default upload directory (`UPLOAD_DIR`).
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";

/// Configuration for the upload service.
///
/// # Example
/// ```rust
/// use lembar_ocr::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .inference_model("llama3.2:3b")
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// TCP port the HTTP server binds on. Default: 3000.
    pub port: u16,

    /// URL of the local inference endpoint (Ollama-style `/api/generate`).
    pub inference_url: String,

    /// Model identifier sent with every inference request.
    pub inference_model: String,

    /// Directory where uploads and derived page images are written. Each file
    /// is uniquely named (epoch millis + original name) so concurrent
    /// requests never collide. Created at startup if missing.
    pub upload_dir: PathBuf,

    /// Maximum accepted request body, enforced by the transport layer before
    /// the handler runs. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Bounded wait for the inference round trip, after which the call is
    /// abandoned and analysis degrades to its fallback. Default: 60 s.
    pub analysis_timeout_secs: u64,

    /// Cap on captured stdout+stderr of external tool invocations. Output
    /// beyond this bound kills the child and fails the request. Default: 20 MiB.
    pub command_output_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            inference_url: DEFAULT_INFERENCE_URL.to_string(),
            inference_model: DEFAULT_INFERENCE_MODEL.to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: 50 * 1024 * 1024,
            analysis_timeout_secs: 60,
            command_output_limit: 20 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read configuration from the environment, falling back to defaults.
    ///
    /// Recognised variables: `PORT`, `LLAMA_API_URL`, `LLAMA_MODEL`,
    /// `UPLOAD_DIR`. Unparseable values fall back to the default rather than
    /// aborting startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(url) = std::env::var("LLAMA_API_URL") {
            if !url.is_empty() {
                config.inference_url = url;
            }
        }
        if let Ok(model) = std::env::var("LLAMA_MODEL") {
            if !model.is_empty() {
                config.inference_model = model;
            }
        }
        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            if !dir.is_empty() {
                config.upload_dir = PathBuf::from(dir);
            }
        }
        config
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn inference_url(mut self, url: impl Into<String>) -> Self {
        self.config.inference_url = url.into();
        self
    }

    pub fn inference_model(mut self, model: impl Into<String>) -> Self {
        self.config.inference_model = model.into();
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes.max(1);
        self
    }

    pub fn analysis_timeout_secs(mut self, secs: u64) -> Self {
        self.config.analysis_timeout_secs = secs.max(1);
        self
    }

    pub fn command_output_limit(mut self, bytes: usize) -> Self {
        self.config.command_output_limit = bytes.max(1024);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, LembarError> {
        let c = &self.config;
        if c.inference_url.is_empty() {
            return Err(LembarError::Internal(
                "inference_url must not be empty".into(),
            ));
        }
        if c.inference_model.is_empty() {
            return Err(LembarError::Internal(
                "inference_model must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ServerConfig::default();
        assert_eq!(c.port, 3000);
        assert_eq!(c.inference_url, "http://localhost:11434/api/generate");
        assert_eq!(c.inference_model, "llama3.2:3b");
        assert_eq!(c.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(c.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(c.analysis_timeout_secs, 60);
    }

    #[test]
    fn builder_overrides_and_clamps() {
        let c = ServerConfig::builder()
            .port(9999)
            .upload_dir("/tmp/scans")
            .max_upload_bytes(0)
            .analysis_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.port, 9999);
        assert_eq!(c.upload_dir, PathBuf::from("/tmp/scans"));
        assert_eq!(c.max_upload_bytes, 1);
        assert_eq!(c.analysis_timeout_secs, 1);
    }

    #[test]
    fn empty_model_rejected() {
        let result = ServerConfig::builder().inference_model("").build();
        assert!(result.is_err());
    }
}
