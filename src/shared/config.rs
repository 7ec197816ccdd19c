//! Application configuration. AI credentials, pipeline tuning, paths.
//!
//! Read from `CLAIM_AUDIT_*` environment variables (and `.env`), plus an optional file
//! named by `CLAIM_AUDIT_CONFIG`.

use crate::domain::ChunkPolicy;
use crate::domain::chunking::{DEFAULT_BATCH_SIZE, DEFAULT_SINGLE_CHUNK_THRESHOLD};
use crate::usecases::{AnalysisSettings, RetryPolicy};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default OpenAI-compatible chat completions endpoint.
pub const DEFAULT_AI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_AI_MAX_ATTEMPTS: u32 = 3;
/// Character budget per chunk, keeps a single request well under model context limits.
pub const DEFAULT_CHUNK_MAX_CHARS: usize = 50_000;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
/// Weighted scores below this floor are never trusted.
pub const DEFAULT_SCORE_FLOOR: f64 = 40.0;
pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // AI Configuration
    // ─────────────────────────────────────────────────────────────────────────
    /// AI API key (e.g., OpenAI). Read from CLAIM_AUDIT_AI_API_KEY.
    #[serde(default)]
    pub ai_api_key: Option<String>,

    /// AI API URL. Defaults to OpenAI. Read from CLAIM_AUDIT_AI_API_URL.
    #[serde(default)]
    pub ai_api_url: Option<String>,

    /// AI model name. Defaults to "gpt-4o-mini". Read from CLAIM_AUDIT_AI_MODEL.
    #[serde(default)]
    pub ai_model: Option<String>,

    /// Per-attempt request timeout in seconds.
    #[serde(default)]
    pub ai_timeout_secs: Option<u64>,

    /// Attempts per chunk or claim, including the first one.
    #[serde(default)]
    pub ai_max_attempts: Option<u32>,

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Configuration
    // ─────────────────────────────────────────────────────────────────────────
    /// Reviews per chunk for large groups.
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Groups up to this size are sent as one chunk.
    #[serde(default)]
    pub chunk_threshold: Option<usize>,

    #[serde(default)]
    pub chunk_max_chars: Option<usize>,

    /// Max in-flight AI calls per run.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    #[serde(default)]
    pub score_floor: Option<f64>,

    /// Database and reports live here.
    #[serde(default)]
    pub data_dir: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var("CLAIM_AUDIT_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        // Environment wins over the file.
        c = c.add_source(config::Environment::with_prefix("CLAIM_AUDIT").try_parsing(true));
        c.build()?.try_deserialize()
    }

    /// Returns the AI API key if configured and non-empty.
    pub fn ai_api_key(&self) -> Option<String> {
        self.ai_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
    }

    /// Returns the AI API URL. Defaults to OpenAI chat completions endpoint.
    pub fn ai_api_url_or_default(&self) -> String {
        self.ai_api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_AI_API_URL.to_string())
    }

    /// Returns the AI model name. Defaults to "gpt-4o-mini".
    pub fn ai_model_or_default(&self) -> String {
        self.ai_model
            .clone()
            .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string())
    }

    /// Returns true if AI is configured (API key present). Otherwise the mock is used.
    pub fn is_ai_configured(&self) -> bool {
        self.ai_api_key().is_some()
    }

    pub fn ai_timeout_or_default(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs.unwrap_or(DEFAULT_AI_TIMEOUT_SECS).max(1))
    }

    pub fn ai_max_attempts_or_default(&self) -> u32 {
        self.ai_max_attempts.unwrap_or(DEFAULT_AI_MAX_ATTEMPTS).max(1)
    }

    pub fn max_concurrency_or_default(&self) -> usize {
        self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY).max(1)
    }

    pub fn score_floor_or_default(&self) -> f64 {
        self.score_floor.unwrap_or(DEFAULT_SCORE_FLOOR)
    }

    /// Returns the data directory. Defaults to "./data".
    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir_or_default().join("reports")
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            single_chunk_threshold: self
                .chunk_threshold
                .unwrap_or(DEFAULT_SINGLE_CHUNK_THRESHOLD),
            batch_size: self.chunk_size.unwrap_or(DEFAULT_BATCH_SIZE),
            max_chars: Some(self.chunk_max_chars.unwrap_or(DEFAULT_CHUNK_MAX_CHARS)),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.ai_max_attempts_or_default(), self.ai_timeout_or_default())
    }

    /// Pipeline settings assembled from the individual keys.
    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            chunk_policy: self.chunk_policy(),
            retry: self.retry_policy(),
            max_concurrency: self.max_concurrency_or_default(),
            score_floor: self.score_floor_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert!(!cfg.is_ai_configured());
        assert_eq!(cfg.ai_model_or_default(), "gpt-4o-mini");
        assert_eq!(cfg.ai_timeout_or_default(), Duration::from_secs(60));
        assert_eq!(cfg.data_dir_or_default(), PathBuf::from("./data"));
        assert_eq!(cfg.reports_dir(), PathBuf::from("./data").join("reports"));

        let settings = cfg.analysis_settings();
        assert_eq!(settings.chunk_policy.batch_size, 80);
        assert_eq!(settings.chunk_policy.single_chunk_threshold, 100);
        assert_eq!(settings.chunk_policy.max_chars, Some(50_000));
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.max_concurrency, 4);
        assert_eq!(settings.score_floor, 40.0);
    }

    #[test]
    fn test_overrides_and_clamping() {
        let cfg = AppConfig {
            ai_api_key: Some("  ".into()),
            ai_max_attempts: Some(0),
            max_concurrency: Some(0),
            chunk_size: Some(20),
            score_floor: Some(55.0),
            ..AppConfig::default()
        };
        assert!(!cfg.is_ai_configured());
        assert_eq!(cfg.ai_max_attempts_or_default(), 1);
        assert_eq!(cfg.max_concurrency_or_default(), 1);
        assert_eq!(cfg.chunk_policy().batch_size, 20);
        assert_eq!(cfg.score_floor_or_default(), 55.0);
    }
}
