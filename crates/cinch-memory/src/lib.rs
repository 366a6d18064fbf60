//! Bounded conversational memory for LLM agents.
//!
//! `cinch-memory` ingests a growing stream of chat messages and keeps a
//! compressed view of them that never exceeds a fixed budget. Two strategies
//! are provided, both behind the [`MemoryBlock`](memory::MemoryBlock) trait:
//!
//! - [`CondensedMemoryBlock`](memory::CondensedMemoryBlock) keeps one short
//!   summary per message and evicts the oldest summaries once the rendered
//!   memory exceeds a token budget. Recent context survives, old context is
//!   dropped whole.
//! - [`PropositionMemoryBlock`](memory::PropositionMemoryBlock) extracts
//!   atomic facts, beliefs, preferences and goals from each batch of messages
//!   and asks the model to condense the list when it grows past a cap.
//!
//! Compression is delegated to a [`Summarizer`](summarizer::Summarizer).
//! The default [`LlmSummarizer`](summarizer::LlmSummarizer) talks to the
//! [OpenRouter](https://openrouter.ai/) chat completions API; tests inject
//! deterministic fakes. Summarizer failures never escape
//! [`ingest`](memory::MemoryBlock::ingest): the affected message is skipped,
//! or the block falls back to deterministic truncation.
//!
//! # Getting started
//!
//! ```ignore
//! use std::sync::Arc;
//! use cinch_memory::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = std::env::var("OPENROUTER_KEY").map_err(|e| e.to_string())?;
//!     let client = OpenRouterClient::new(api_key)?;
//!     let summarizer = Arc::new(LlmSummarizer::new(client, SummarizerConfig::default()));
//!
//!     let mut block = PropositionMemoryBlock::new(
//!         "facts",
//!         PropositionConfig::default().with_max_propositions(20),
//!         summarizer,
//!     );
//!
//!     block
//!         .ingest(&[ChatMessage::user("I moved to Lisbon last spring.")])
//!         .await;
//!     println!("{}", block.render());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`memory`] | [`MemoryBlock`](memory::MemoryBlock) trait, condensed and proposition blocks, block configs |
//! | [`summarizer`] | [`Summarizer`](summarizer::Summarizer) trait, error type, proposition markup, LLM-backed implementation |
//! | [`meter`] | [`LengthMeter`](meter::LengthMeter) trait with character and token-estimate meters |
//! | [`message`] | [`ChatMessage`](message::ChatMessage), the ingestion input |
//! | [`api`] | Retry with backoff for transient API errors |
//! | [`config`] | File-level [`MemoryConfig`](config::MemoryConfig) used by the CLI |

pub mod api;
pub mod config;
pub mod memory;
pub mod message;
pub mod meter;
pub mod prelude;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for summarization, extraction and condensation calls.
pub const DEFAULT_MODEL: &str = "openai/gpt-4.1-mini";

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message on the wire to the chat completions API.
///
/// This is the transport shape. Conversation input to memory blocks uses the
/// richer [`ChatMessage`](message::ChatMessage).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from `OpenRouterClient::chat()`.
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) referer: String,
    pub(crate) title: String,
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://github.com/cinch-rs", "cinch-memory")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("cinch-memory/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
        })
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model.as_deref().unwrap_or("(none)"),
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        parse_chat_response(&text)
    }
}

/// Decode a raw chat completions response body.
fn parse_chat_response(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("OpenRouter API error: {}", err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    match parsed.choices.and_then(|c| c.into_iter().next()) {
        Some(c) => Ok(ChatCompletion {
            content: c.message.content,
            usage: parsed.usage,
            finish_reason: c.finish_reason,
        }),
        None => {
            debug!("LLM output: empty (no choices)");
            Ok(ChatCompletion {
                content: None,
                usage: parsed.usage,
                finish_reason: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);
    }

    #[test]
    fn chat_request_default_skips_empty_fields() {
        let req = ChatRequest {
            model: Some("test-model".into()),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
        assert!(json.get("seed").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn parse_response_takes_first_choice() {
        let body = r#"{
            "choices": [{"message": {"content": "short"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let completion = parse_chat_response(body).unwrap();
        assert_eq!(completion.content.as_deref(), Some("short"));
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().total_tokens, Some(12));
    }

    #[test]
    fn parse_response_surfaces_api_error() {
        let body = r#"{"error": {"message": "quota exceeded"}}"#;
        let err = parse_chat_response(body).unwrap_err();
        assert!(err.contains("quota exceeded"));
    }

    #[test]
    fn parse_response_without_choices_is_empty() {
        let completion = parse_chat_response(r#"{"choices": []}"#).unwrap();
        assert!(completion.content.is_none());
    }

    #[test]
    fn parse_response_rejects_garbage() {
        let err = parse_chat_response("<html>bad gateway</html>").unwrap_err();
        assert!(err.starts_with("failed to parse response"));
    }
}
