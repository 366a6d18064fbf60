//! Proposition memory: atomic facts extracted from the conversation.
//!
//! Each ingested batch is rendered as a transcript and handed to
//! [`Summarizer::extract_propositions`] together with the propositions
//! already known. New ones are appended in discovery order. Once the list
//! grows past `max_propositions`, [`Summarizer::condense_propositions`]
//! merges and prunes it and its answer replaces the whole list.
//!
//! The summarizer is trusted for content but not for size: a condensation
//! that fails, or still returns too many propositions, is followed by
//! oldest-first truncation down to the cap.

use super::{IngestFuture, MemoryBlock, MemoryStats, Strategy};
use crate::message::ChatMessage;
use crate::summarizer::{Summarizer, format_propositions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default cap on stored propositions.
pub const DEFAULT_MAX_PROPOSITIONS: usize = 50;

/// Capacity configuration for [`PropositionMemoryBlock`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct PropositionConfig {
    pub max_propositions: usize,
}

impl Default for PropositionConfig {
    fn default() -> Self {
        Self {
            max_propositions: DEFAULT_MAX_PROPOSITIONS,
        }
    }
}

impl PropositionConfig {
    pub fn with_max_propositions(mut self, max: usize) -> Self {
        self.max_propositions = max;
        self
    }
}

/// Memory block keeping extracted propositions under an item cap.
pub struct PropositionMemoryBlock {
    name: String,
    config: PropositionConfig,
    propositions: Vec<String>,
    summarizer: Arc<dyn Summarizer>,
}

impl PropositionMemoryBlock {
    pub fn new(
        name: impl Into<String>,
        config: PropositionConfig,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            propositions: Vec::new(),
            summarizer,
        }
    }

    pub fn config(&self) -> &PropositionConfig {
        &self.config
    }

    /// Stored propositions, oldest first.
    pub fn propositions(&self) -> &[String] {
        &self.propositions
    }

    /// The rendered propositions wrapped in the instruction block an agent
    /// prepends to the user's turn, or `None` when nothing is known yet.
    pub fn known_propositions_preamble(&self) -> Option<String> {
        if self.propositions.is_empty() {
            return None;
        }
        Some(format!(
            "Known propositions from conversation so far:\n{}\n\
             When answering, reference the known propositions above if relevant.\n",
            self.render()
        ))
    }

    /// Bring `working` back under the cap, preferring the summarizer's
    /// condensation and falling back to dropping the oldest entries.
    async fn condense(&self, mut working: Vec<String>) -> Vec<String> {
        let cap = self.config.max_propositions;
        let before = working.len();

        match self.summarizer.condense_propositions(&working, cap).await {
            Ok(condensed) => {
                let mut cleaned = Vec::with_capacity(condensed.len());
                append_new(&mut cleaned, condensed);
                if cleaned.len() > cap {
                    warn!(
                        "Memory '{}': condensation returned {} propositions for cap {}; truncating oldest",
                        self.name,
                        cleaned.len(),
                        cap
                    );
                    truncate_oldest(&mut cleaned, cap);
                }
                info!(
                    "Memory '{}': condensed {} propositions to {}",
                    self.name,
                    before,
                    cleaned.len()
                );
                cleaned
            }
            Err(e) => {
                warn!(
                    "Memory '{}': condensation failed: {e}. Dropping {} oldest proposition(s)",
                    self.name,
                    before.saturating_sub(cap)
                );
                truncate_oldest(&mut working, cap);
                working
            }
        }
    }
}

impl MemoryBlock for PropositionMemoryBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn ingest<'a>(&'a mut self, messages: &'a [ChatMessage]) -> IngestFuture<'a> {
        Box::pin(async move {
            if messages.is_empty() {
                return;
            }
            let transcript = render_transcript(messages);
            if transcript.is_empty() {
                debug!(
                    "Memory '{}': batch of {} message(s) has no text, skipped",
                    self.name,
                    messages.len()
                );
                return;
            }

            let extracted = match self
                .summarizer
                .extract_propositions(&self.propositions, &transcript)
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    warn!(
                        "Memory '{}': skipping batch of {} message(s): {e}",
                        self.name,
                        messages.len()
                    );
                    return;
                }
            };

            let mut working = self.propositions.clone();
            let added = append_new(&mut working, extracted);
            debug!(
                "Memory '{}': extracted {} new proposition(s), {} total",
                self.name,
                added,
                working.len()
            );

            if working.len() > self.config.max_propositions {
                working = self.condense(working).await;
            }
            self.propositions = working;
        })
    }

    fn render(&self) -> String {
        format_propositions(&self.propositions)
    }

    fn len(&self) -> usize {
        self.propositions.len()
    }

    fn stats(&self) -> MemoryStats {
        MemoryStats {
            name: self.name.clone(),
            strategy: Strategy::Proposition,
            items: self.propositions.len(),
            measured: None,
            capacity: self.config.max_propositions,
        }
    }
}

/// Render a batch as `[role]: text` paragraphs, skipping messages without text.
fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|m| {
            let text = m.text();
            let text = text.trim();
            (!text.is_empty()).then(|| format!("[{}]: {text}", m.role))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Append trimmed, non-empty candidates not already present. Returns how
/// many were added.
fn append_new(list: &mut Vec<String>, candidates: Vec<String>) -> usize {
    let mut added = 0;
    for candidate in candidates {
        let candidate = candidate.trim();
        if candidate.is_empty() || list.iter().any(|p| p == candidate) {
            continue;
        }
        list.push(candidate.to_string());
        added += 1;
    }
    added
}

fn truncate_oldest(list: &mut Vec<String>, cap: usize) {
    let excess = list.len().saturating_sub(cap);
    list.drain(..excess);
}
