//! Condensed memory: one short summary per message under a token budget.
//!
//! Each ingested message becomes a single fragment. Text blocks that already
//! fit in `max_summary_chars` are copied as-is; longer ones go through
//! [`Summarizer::summarize`]. Tool calls and message metadata are appended
//! as a parenthesized line so the memory records what the agent did, not
//! only what it said.
//!
//! When the rendered memory measures more than `token_limit`, the oldest
//! fragments are evicted whole. There is no second round of compression:
//! recent context is kept at summary fidelity and old context is dropped.
//! A lone fragment is never evicted, even if it alone exceeds the limit.

use super::{IngestFuture, MemoryBlock, MemoryStats, Strategy};
use crate::message::ChatMessage;
use crate::meter::LengthMeter;
use crate::summarizer::{Summarizer, SummarizerError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default token budget for a condensed block.
pub const DEFAULT_TOKEN_LIMIT: usize = 50_000;

/// Default character budget for one summarized text block.
pub const MAX_SUMMARY_CHARS: usize = 128;

const FRAGMENT_SEPARATOR: &str = "\n";

/// Marker appended to text cut down to the character budget.
const ELLIPSIS: &str = "...";

/// Metadata keys that identify plumbing, not conversation content.
const IGNORED_METADATA_KEYS: &[&str] = &["session_id", "tool_call_id", "tool_calls"];

/// Capacity configuration for [`CondensedMemoryBlock`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CondensedConfig {
    /// Budget for the measured length of the rendered memory.
    pub token_limit: usize,
    /// Character budget for each summarized text block.
    pub max_summary_chars: usize,
}

impl Default for CondensedConfig {
    fn default() -> Self {
        Self {
            token_limit: DEFAULT_TOKEN_LIMIT,
            max_summary_chars: MAX_SUMMARY_CHARS,
        }
    }
}

impl CondensedConfig {
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = limit;
        self
    }

    pub fn with_max_summary_chars(mut self, chars: usize) -> Self {
        self.max_summary_chars = chars;
        self
    }
}

/// Memory block keeping per-message summaries, evicting oldest-first.
pub struct CondensedMemoryBlock {
    name: String,
    config: CondensedConfig,
    fragments: VecDeque<String>,
    summarizer: Arc<dyn Summarizer>,
    meter: Arc<dyn LengthMeter>,
}

impl CondensedMemoryBlock {
    pub fn new(
        name: impl Into<String>,
        config: CondensedConfig,
        summarizer: Arc<dyn Summarizer>,
        meter: Arc<dyn LengthMeter>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            fragments: VecDeque::new(),
            summarizer,
            meter,
        }
    }

    pub fn config(&self) -> &CondensedConfig {
        &self.config
    }

    /// Stored fragments, oldest first.
    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(String::as_str)
    }

    /// Measured length of the rendered memory, separators included.
    pub fn measured_len(&self) -> usize {
        self.meter.measure(&self.render())
    }

    /// Compress one message into a fragment.
    ///
    /// `Ok(None)` means the message carries nothing worth remembering.
    /// Any summarizer failure fails the whole message.
    async fn condense_message(
        &self,
        message: &ChatMessage,
    ) -> Result<Option<String>, SummarizerError> {
        let mut parts = Vec::new();
        for text in message.text_blocks() {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            parts.push(self.compress(text).await?);
        }
        if let Some(meta) = describe_metadata(message) {
            let meta = clamp_chars(&meta, self.config.max_summary_chars);
            if !meta.is_empty() {
                parts.push(meta);
            }
        }

        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(parts.join("\n")))
        }
    }

    async fn compress(&self, text: &str) -> Result<String, SummarizerError> {
        let max_chars = self.config.max_summary_chars;
        if text.chars().count() <= max_chars {
            return Ok(text.to_string());
        }

        let summary = self.summarizer.summarize(text, max_chars).await?;
        let summary = clamp_chars(summary.trim(), max_chars);
        if summary.is_empty() {
            return Err(SummarizerError::Malformed(format!(
                "empty summary (budget {max_chars} chars)"
            )));
        }
        Ok(summary)
    }

    /// Evict oldest fragments until the rendered memory fits the limit or
    /// one fragment remains. Returns the number evicted.
    fn enforce_limit(&mut self) -> usize {
        let limit = self.config.token_limit;
        let mut measured = self.measured_len();
        let mut evicted = 0;
        while measured > limit && self.fragments.len() > 1 {
            self.fragments.pop_front();
            evicted += 1;
            measured = self.measured_len();
        }

        if evicted > 0 {
            info!(
                "Memory '{}': evicted {} oldest fragment(s), now ~{} of {} tokens",
                self.name, evicted, measured, limit
            );
        }
        if measured > limit {
            debug!(
                "Memory '{}': single fragment of ~{} tokens exceeds limit {}; keeping it",
                self.name, measured, limit
            );
        }
        evicted
    }
}

impl MemoryBlock for CondensedMemoryBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn ingest<'a>(&'a mut self, messages: &'a [ChatMessage]) -> IngestFuture<'a> {
        Box::pin(async move {
            for (i, message) in messages.iter().enumerate() {
                match self.condense_message(message).await {
                    Ok(Some(fragment)) => {
                        debug!(
                            "Memory '{}': stored {} fragment ({} chars)",
                            self.name,
                            message.role,
                            fragment.chars().count()
                        );
                        self.fragments.push_back(fragment);
                        self.enforce_limit();
                    }
                    Ok(None) => {
                        debug!(
                            "Memory '{}': message {} has no text or metadata, skipped",
                            self.name, i
                        );
                    }
                    Err(e) => {
                        warn!(
                            "Memory '{}': skipping {} message {}: {e}",
                            self.name, message.role, i
                        );
                    }
                }
            }
        })
    }

    fn render(&self) -> String {
        self.fragments
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(FRAGMENT_SEPARATOR)
    }

    fn len(&self) -> usize {
        self.fragments.len()
    }

    fn stats(&self) -> MemoryStats {
        MemoryStats {
            name: self.name.clone(),
            strategy: Strategy::Condensed,
            items: self.fragments.len(),
            measured: Some(self.measured_len()),
            capacity: self.config.token_limit,
        }
    }
}

/// Describe tool calls and metadata as `(key=value, ...)`, or `None` if
/// there is nothing to describe.
fn describe_metadata(message: &ChatMessage) -> Option<String> {
    let mut entries = Vec::new();

    if !message.tool_calls.is_empty() {
        let calls: Vec<String> = message
            .tool_calls
            .iter()
            .map(|c| format!("{}({})", c.name, c.arguments))
            .collect();
        entries.push(format!("tool_calls: {}", calls.join(", ")));
    }

    for (key, value) in &message.metadata {
        if IGNORED_METADATA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        entries.push(format!("{key}={value}"));
    }

    if entries.is_empty() {
        None
    } else {
        Some(format!("({})", entries.join(", ")))
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
fn clamp_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let ellipsis_len = ELLIPSIS.len();
    if max_chars <= ellipsis_len {
        return text.chars().take(max_chars).collect();
    }
    let kept: String = text.chars().take(max_chars - ellipsis_len).collect();
    format!("{}{ELLIPSIS}", kept.trim_end())
}
