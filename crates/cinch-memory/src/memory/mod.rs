//! Memory blocks: bounded, incrementally compressed views of a conversation.
//!
//! Every block follows the same contract ([`MemoryBlock`]):
//!
//! 1. **Ingest** messages in order. Each message (or batch) is compressed
//!    through the injected [`Summarizer`] and appended to the block's state.
//! 2. **Enforce capacity** before `ingest` returns: token length for
//!    [`CondensedMemoryBlock`], item count for [`PropositionMemoryBlock`].
//!    Capacity is restored by eviction or truncation, never by an error.
//! 3. **Render** the state as one string, oldest item first, ready to be
//!    placed in a prompt.
//!
//! Summarizer failures are absorbed: the affected message or batch is
//! skipped and the previous state is left untouched. State is only written
//! after each awaited call completes, so dropping an `ingest` future midway
//! keeps exactly the messages that were fully processed.
//!
//! [`MemoryBlockKind`] is the closed set of strategies, built from a
//! [`BlockConfig`]. [`SharedMemoryBlock`] serializes access when one block
//! is shared between tasks.

pub mod condensed;
pub mod proposition;

pub use condensed::{CondensedConfig, CondensedMemoryBlock};
pub use proposition::{PropositionConfig, PropositionMemoryBlock};

use crate::message::ChatMessage;
use crate::meter::LengthMeter;
use crate::summarizer::Summarizer;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by [`MemoryBlock::ingest`].
pub type IngestFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A bounded memory of a conversation.
pub trait MemoryBlock: Send {
    /// Name given at construction (used in logs and stats).
    fn name(&self) -> &str;

    /// Ingest messages in order, then enforce the capacity invariant.
    ///
    /// Never fails. An empty slice is a no-op.
    fn ingest<'a>(&'a mut self, messages: &'a [ChatMessage]) -> IngestFuture<'a>;

    /// The current memory as one string, oldest item first. Empty state
    /// renders as `""`.
    fn render(&self) -> String;

    /// Number of stored items (fragments or propositions).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only snapshot for verbose/debug display.
    fn stats(&self) -> MemoryStats;
}

/// Compaction strategy of a block.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Condensed,
    Proposition,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Condensed => write!(f, "condensed"),
            Strategy::Proposition => write!(f, "proposition"),
        }
    }
}

/// Snapshot of a block's size against its capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStats {
    pub name: String,
    pub strategy: Strategy,
    /// Stored fragments or propositions.
    pub items: usize,
    /// Measured length of the rendered state (condensed blocks only).
    pub measured: Option<usize>,
    /// `token_limit` or `max_propositions`.
    pub capacity: usize,
}

impl MemoryStats {
    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        match self.measured {
            Some(measured) => format!(
                "{} [{}]: {} fragments, ~{} of {} tokens",
                self.name, self.strategy, self.items, measured, self.capacity,
            ),
            None => format!(
                "{} [{}]: {} of {} propositions",
                self.name, self.strategy, self.items, self.capacity,
            ),
        }
    }
}

/// Which block to build, and with what capacity.
///
/// ```json
/// {"name": "session", "strategy": "proposition", "proposition": {"max_propositions": 20}}
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BlockConfig {
    pub name: String,
    pub strategy: Strategy,
    pub condensed: CondensedConfig,
    pub proposition: PropositionConfig,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            strategy: Strategy::default(),
            condensed: CondensedConfig::default(),
            proposition: PropositionConfig::default(),
        }
    }
}

impl BlockConfig {
    pub fn condensed(name: impl Into<String>, config: CondensedConfig) -> Self {
        Self {
            name: name.into(),
            strategy: Strategy::Condensed,
            condensed: config,
            ..Default::default()
        }
    }

    pub fn proposition(name: impl Into<String>, config: PropositionConfig) -> Self {
        Self {
            name: name.into(),
            strategy: Strategy::Proposition,
            proposition: config,
            ..Default::default()
        }
    }
}

/// The closed set of memory strategies.
pub enum MemoryBlockKind {
    Condensed(CondensedMemoryBlock),
    Proposition(PropositionMemoryBlock),
}

impl MemoryBlockKind {
    /// Build the block `config` describes. The meter is only used by the
    /// condensed strategy.
    pub fn from_config(
        config: &BlockConfig,
        summarizer: Arc<dyn Summarizer>,
        meter: Arc<dyn LengthMeter>,
    ) -> Self {
        match config.strategy {
            Strategy::Condensed => MemoryBlockKind::Condensed(CondensedMemoryBlock::new(
                config.name.clone(),
                config.condensed.clone(),
                summarizer,
                meter,
            )),
            Strategy::Proposition => MemoryBlockKind::Proposition(PropositionMemoryBlock::new(
                config.name.clone(),
                config.proposition.clone(),
                summarizer,
            )),
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            MemoryBlockKind::Condensed(_) => Strategy::Condensed,
            MemoryBlockKind::Proposition(_) => Strategy::Proposition,
        }
    }

    fn inner(&self) -> &dyn MemoryBlock {
        match self {
            MemoryBlockKind::Condensed(b) => b,
            MemoryBlockKind::Proposition(b) => b,
        }
    }
}

impl MemoryBlock for MemoryBlockKind {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn ingest<'a>(&'a mut self, messages: &'a [ChatMessage]) -> IngestFuture<'a> {
        match self {
            MemoryBlockKind::Condensed(b) => b.ingest(messages),
            MemoryBlockKind::Proposition(b) => b.ingest(messages),
        }
    }

    fn render(&self) -> String {
        self.inner().render()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn stats(&self) -> MemoryStats {
        self.inner().stats()
    }
}

/// A block shared between tasks. Calls are serialized by an async mutex, so
/// a `render` never observes an `ingest` halfway through.
pub struct SharedMemoryBlock<B> {
    inner: Arc<tokio::sync::Mutex<B>>,
}

impl<B> Clone for SharedMemoryBlock<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: MemoryBlock> SharedMemoryBlock<B> {
    pub fn new(block: B) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(block)),
        }
    }

    pub async fn ingest(&self, messages: &[ChatMessage]) {
        self.inner.lock().await.ingest(messages).await;
    }

    pub async fn render(&self) -> String {
        self.inner.lock().await.render()
    }

    pub async fn stats(&self) -> MemoryStats {
        self.inner.lock().await.stats()
    }
}
