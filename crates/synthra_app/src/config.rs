//! Runtime configuration for the headless app.
//!
//! Read from the RON file named by `SYNTHRA_CONFIG` (default `./synthra.ron`).
//! Every field is optional; a missing file yields [`AppConfig::default`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use synthra_engine::{LifecycleSettings, OpenAiSettings, SummarizerSettings};

pub const CONFIG_ENV: &str = "SYNTHRA_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./synthra.ron";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub base_url: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub transcript_dir: PathBuf,
    pub state_dir: PathBuf,
    pub init_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub retry_delay_secs: u64,
    pub max_retries: u32,
    pub debounce_window_ms: u64,
    /// Periodic liveness probe; off when unset.
    pub health_check_interval_secs: Option<u64>,
    pub safety_margin: f32,
    pub chars_per_token: u32,
    pub fallback_context_window: u32,
    pub chunk_chars: usize,
    pub free_max_tokens: u32,
    pub premium_max_tokens: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let lifecycle = LifecycleSettings::default();
        let summarizer = SummarizerSettings::default();
        let openai = OpenAiSettings::default();
        Self {
            log_level: "info".to_string(),
            base_url: openai.base_url,
            model_id: openai.model_id,
            api_key: None,
            transcript_dir: PathBuf::from("./transcripts"),
            state_dir: PathBuf::from("."),
            init_timeout_secs: lifecycle.init_timeout.as_secs(),
            probe_timeout_secs: lifecycle.probe_timeout.as_secs(),
            retry_delay_secs: lifecycle.retry_delay.as_secs(),
            max_retries: lifecycle.max_retries,
            debounce_window_ms: 1500,
            health_check_interval_secs: None,
            safety_margin: summarizer.safety_margin,
            chars_per_token: summarizer.chars_per_token,
            fallback_context_window: lifecycle.fallback_context_window,
            chunk_chars: summarizer.chunk_chars,
            free_max_tokens: summarizer.free_max_tokens,
            premium_max_tokens: summarizer.premium_max_tokens,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read config {}", path.display()))
            }
        };
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = ron::from_str(content)?;
        anyhow::ensure!(
            config.safety_margin > 0.0 && config.safety_margin <= 1.0,
            "safety_margin must be in (0, 1], got {}",
            config.safety_margin
        );
        anyhow::ensure!(config.chunk_chars > 0, "chunk_chars must be positive");
        anyhow::ensure!(config.chars_per_token > 0, "chars_per_token must be positive");
        Ok(config)
    }

    pub fn lifecycle(&self) -> LifecycleSettings {
        LifecycleSettings {
            init_timeout: Duration::from_secs(self.init_timeout_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            max_retries: self.max_retries,
            fallback_context_window: self.fallback_context_window,
        }
    }

    pub fn summarizer(&self) -> SummarizerSettings {
        SummarizerSettings {
            safety_margin: self.safety_margin,
            chars_per_token: self.chars_per_token,
            chunk_chars: self.chunk_chars,
            free_max_tokens: self.free_max_tokens,
            premium_max_tokens: self.premium_max_tokens,
        }
    }

    pub fn openai(&self) -> OpenAiSettings {
        OpenAiSettings {
            base_url: self.base_url.clone(),
            model_id: self.model_id.clone(),
            api_key: self.api_key.clone(),
            ..OpenAiSettings::default()
        }
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn health_check_interval(&self) -> Option<Duration> {
        self.health_check_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// `$SYNTHRA_CONFIG`, or `./synthra.ron` when unset.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
