//! Convenience re-exports for common `cinch-memory` types.
//!
//! ```ignore
//! use cinch_memory::prelude::*;
//! ```
//!
//! Pulls in the block types and configs, the summarizer and meter traits
//! with their default implementations, and the message type blocks ingest.
//! Proposition markup helpers and retry internals stay in their modules.

pub use crate::OpenRouterClient;
pub use crate::config::{MemoryConfig, MeterKind};
pub use crate::memory::{
    BlockConfig, CondensedConfig, CondensedMemoryBlock, MemoryBlock, MemoryBlockKind,
    MemoryStats, PropositionConfig, PropositionMemoryBlock, SharedMemoryBlock, Strategy,
};
pub use crate::message::{ChatMessage, ContentBlock};
pub use crate::meter::{CharMeter, LengthMeter, TokenEstimator};
pub use crate::summarizer::{LlmSummarizer, Summarizer, SummarizerConfig, SummarizerError};
