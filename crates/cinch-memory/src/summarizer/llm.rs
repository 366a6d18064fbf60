//! [`Summarizer`] backed by an OpenRouter chat model.
//!
//! Each capability is a single one-shot completion: a fixed system prompt
//! plus a user message carrying the text (and, for propositions, the list
//! already known). Calls are retried on transient errors and bounded by a
//! timeout; whatever still fails comes back as a [`SummarizerError`].

use super::{
    Summarizer, SummarizerError, SummarizerFuture, format_propositions, parse_propositions,
};
use crate::api::{RetryConfig, retry_api_call};
use crate::{ChatRequest, DEFAULT_MODEL, Message, OpenRouterClient};
use std::time::{Duration, Instant};
use tracing::debug;

const SUMMARIZE_PROMPT: &str = "\
You compress chat messages for an assistant's long-running memory.

Rules:
- Stay within the character budget given by the user. Shorter is fine.
- Keep names, numbers, dates, file paths and decisions verbatim.
- Only include facts stated in the text. Do not infer or extrapolate.
- Output ONLY the compressed text: no preamble, no quotes, no commentary.";

const EXTRACTION_PROMPT: &str = "\
You extract propositions from conversations for an assistant's memory.

A proposition is one atomic, self-contained statement the user disclosed or \
the conversation established. Capture every kind:
- facts and context (personal details, requirements, constraints)
- opinions and beliefs
- preferences and choices
- experiences and anecdotes
- goals and intentions

Rules:
- One statement per <proposition> element.
- Do not repeat anything already listed under EXISTING PROPOSITIONS, even reworded.
- Output ONLY this format:
<propositions>
  <proposition>First new proposition</proposition>
  <proposition>Second new proposition</proposition>
</propositions>
- If there is nothing new, output <propositions></propositions>";

const CONDENSE_PROMPT: &str = "\
You condense an assistant's memory of propositions about a conversation.

Rules:
- Return at most the number of propositions the user allows.
- Merge propositions that overlap or say the same thing; keep the most \
  specific wording.
- When one proposition supersedes another, keep only the newer one.
- Drop the least useful propositions last: goals, constraints and stated \
  preferences matter most.
- Output ONLY this format:
<propositions>
  <proposition>Condensed proposition</proposition>
</propositions>";

/// Configuration for [`LlmSummarizer`].
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Model used for every call (a cheap one is usually enough).
    pub model: String,
    /// Maximum tokens for each completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound for one capability call, retries included.
    pub timeout: Duration,
    /// Backoff for transient API errors.
    pub retry: RetryConfig,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2048,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

impl SummarizerConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Summarizer that sends one chat completion per capability call.
pub struct LlmSummarizer {
    client: OpenRouterClient,
    config: SummarizerConfig,
}

impl LlmSummarizer {
    pub fn new(client: OpenRouterClient, config: SummarizerConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Send one (system, user) pair and return the trimmed completion text
    /// with the reason generation stopped.
    async fn complete(&self, system: &str, user: &str) -> Result<Reply, SummarizerError> {
        let request = ChatRequest {
            model: Some(self.config.model.clone()),
            messages: vec![Message::system(system), Message::user(user)],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            ..Default::default()
        };

        let client = &self.client;
        let start = Instant::now();
        let call = retry_api_call(&self.config.retry, || client.chat(&request));
        let completion = match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => return Err(SummarizerError::Unavailable(e)),
            Err(_) => return Err(SummarizerError::Timeout(self.config.timeout)),
        };
        debug!(
            "Summarizer call completed in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        match completion.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(Reply {
                text: text.to_string(),
                finish_reason: completion.finish_reason,
            }),
            _ => Err(SummarizerError::Malformed(format!(
                "empty completion (finish_reason={})",
                completion.finish_reason.as_deref().unwrap_or("none")
            ))),
        }
    }
}

/// A non-empty completion.
struct Reply {
    text: String,
    finish_reason: Option<String>,
}

/// Parse proposition markup out of a completion. A reply that hit the token
/// limit is rejected even when its markup happens to balance.
fn parse_proposition_reply(
    text: &str,
    finish_reason: Option<&str>,
) -> Result<Vec<String>, SummarizerError> {
    if finish_reason == Some("length") {
        return Err(SummarizerError::Malformed(format!(
            "proposition list cut off at max_tokens after {} chars",
            text.chars().count()
        )));
    }
    parse_propositions(text)
}

/// Build the (system, user) pair for compressing `text` to `max_chars`.
pub fn build_summarize_request(text: &str, max_chars: usize) -> (String, String) {
    let user = format!("Character budget: {max_chars}\n\n=== TEXT ===\n{text}");
    (SUMMARIZE_PROMPT.to_string(), user)
}

/// Build the (system, user) pair for extracting new propositions.
pub fn build_extraction_request(existing: &[String], new_text: &str) -> (String, String) {
    let mut user = String::new();
    user.push_str("=== EXISTING PROPOSITIONS ===\n");
    if existing.is_empty() {
        user.push_str("(none)\n");
    } else {
        user.push_str(&format_propositions(existing));
        user.push('\n');
    }
    user.push_str("\n=== CONVERSATION ===\n");
    user.push_str(new_text);
    (EXTRACTION_PROMPT.to_string(), user)
}

/// Build the (system, user) pair for condensing `current` to `cap` entries.
pub fn build_condense_request(current: &[String], cap: usize) -> (String, String) {
    let user = format!(
        "Condense these {} propositions to at most {cap}.\n\n\
         === EXISTING PROPOSITIONS ===\n{}",
        current.len(),
        format_propositions(current),
    );
    (CONDENSE_PROMPT.to_string(), user)
}

impl Summarizer for LlmSummarizer {
    fn summarize<'a>(&'a self, text: &'a str, max_chars: usize) -> SummarizerFuture<'a, String> {
        Box::pin(async move {
            let (system, user) = build_summarize_request(text, max_chars);
            Ok(self.complete(&system, &user).await?.text)
        })
    }

    fn extract_propositions<'a>(
        &'a self,
        existing: &'a [String],
        new_text: &'a str,
    ) -> SummarizerFuture<'a, Vec<String>> {
        Box::pin(async move {
            let (system, user) = build_extraction_request(existing, new_text);
            let reply = self.complete(&system, &user).await?;
            parse_proposition_reply(&reply.text, reply.finish_reason.as_deref())
        })
    }

    fn condense_propositions<'a>(
        &'a self,
        current: &'a [String],
        cap: usize,
    ) -> SummarizerFuture<'a, Vec<String>> {
        Box::pin(async move {
            let (system, user) = build_condense_request(current, cap);
            let reply = self.complete(&system, &user).await?;
            parse_proposition_reply(&reply.text, reply.finish_reason.as_deref())
        })
    }
}
