//! File-level configuration: which block to build, how to meter it, and how
//! to reach the summarization model.
//!
//! Every field has a default, so `{}` is a valid config file:
//!
//! ```json
//! {
//!   "block": {"name": "session", "strategy": "condensed", "condensed": {"token_limit": 2000}},
//!   "meter": "tokens",
//!   "chars_per_token": 3.5,
//!   "summarizer": {"model": "openai/gpt-4.1-mini", "timeout_secs": 30, "retries": 2}
//! }
//! ```

use crate::api::RetryConfig;
use crate::memory::BlockConfig;
use crate::meter::{CharMeter, DEFAULT_CHARS_PER_TOKEN, LengthMeter, TokenEstimator};
use crate::summarizer::SummarizerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Unit a condensed block's `token_limit` is measured in.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeterKind {
    /// Estimated model tokens (characters / `chars_per_token`).
    #[default]
    Tokens,
    /// Unicode characters.
    Chars,
}

/// Serializable subset of [`SummarizerConfig`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SummarizerSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub retries: u32,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        let defaults = SummarizerConfig::default();
        Self {
            model: defaults.model,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            timeout_secs: defaults.timeout.as_secs(),
            retries: defaults.retry.max_retries,
        }
    }
}

impl SummarizerSettings {
    pub fn to_summarizer_config(&self) -> SummarizerConfig {
        SummarizerConfig::default()
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry(RetryConfig::with_retries(self.retries))
    }
}

/// Top-level configuration for a memory session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    pub block: BlockConfig,
    pub meter: MeterKind,
    pub chars_per_token: f64,
    pub summarizer: SummarizerSettings,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            block: BlockConfig::default(),
            meter: MeterKind::default(),
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            summarizer: SummarizerSettings::default(),
        }
    }
}

impl MemoryConfig {
    /// Load a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("invalid config {}: {e}", path.display()))
    }

    /// The length meter this config asks for.
    pub fn build_meter(&self) -> Arc<dyn LengthMeter> {
        match self.meter {
            MeterKind::Tokens => Arc::new(TokenEstimator::with_chars_per_token(self.chars_per_token)),
            MeterKind::Chars => Arc::new(CharMeter),
        }
    }
}
