//! The summarization oracle memory blocks compress through.
//!
//! A [`Summarizer`] offers three capabilities:
//!
//! - [`summarize`](Summarizer::summarize) shortens one piece of text to a
//!   character budget (condensed blocks, one call per long message);
//! - [`extract_propositions`](Summarizer::extract_propositions) finds new
//!   atomic facts in a batch of messages, given the ones already known;
//! - [`condense_propositions`](Summarizer::condense_propositions) merges and
//!   prunes a proposition list down to a cap.
//!
//! The oracle is unreliable by nature. Every call returns a
//! [`SummarizerError`] on failure and memory blocks decide how to degrade.
//! Propositions travel as `<proposition>…</proposition>` markup; this module
//! owns the formatting and a lenient parser for it.

pub mod llm;

pub use llm::{LlmSummarizer, SummarizerConfig};

use regex::Regex;
use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;
use std::time::Duration;

/// Boxed future returned by [`Summarizer`] methods.
pub type SummarizerFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, SummarizerError>> + Send + 'a>>;

/// Why a summarizer call produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummarizerError {
    /// The call failed outright: network, HTTP status, quota.
    #[error("summarizer unavailable: {0}")]
    Unavailable(String),
    /// The call did not finish within the configured timeout.
    #[error("summarizer timed out after {0:?}")]
    Timeout(Duration),
    /// The call returned content that can't be used (empty, no markup).
    #[error("malformed summarizer output: {0}")]
    Malformed(String),
}

/// Compression, extraction and condensation capabilities backing memory blocks.
///
/// Implementations must be safe to share across sessions; blocks hold them
/// as `Arc<dyn Summarizer>`.
pub trait Summarizer: Send + Sync {
    /// Compress `text` to at most `max_chars` characters.
    fn summarize<'a>(&'a self, text: &'a str, max_chars: usize) -> SummarizerFuture<'a, String>;

    /// Return propositions found in `new_text` that are not already among
    /// `existing`, in discovery order.
    fn extract_propositions<'a>(
        &'a self,
        existing: &'a [String],
        new_text: &'a str,
    ) -> SummarizerFuture<'a, Vec<String>>;

    /// Return a merged/pruned version of `current` with at most `cap` entries.
    fn condense_propositions<'a>(
        &'a self,
        current: &'a [String],
        cap: usize,
    ) -> SummarizerFuture<'a, Vec<String>>;
}

// ── Proposition markup ─────────────────────────────────────────────

pub const PROPOSITION_OPEN: &str = "<proposition>";
pub const PROPOSITION_CLOSE: &str = "</proposition>";

/// Wrapper the model is asked to put around its answer.
const PROPOSITIONS_OPEN: &str = "<propositions>";
const PROPOSITIONS_CLOSE: &str = "</propositions>";
const PROPOSITIONS_EMPTY: &str = "<propositions/>";

static PROPOSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<proposition>(.*?)</proposition>").expect("proposition pattern is valid")
});

/// Render one proposition as a tagged element. Markup characters inside the
/// text are entity-escaped so the element re-parses to the same string.
pub fn format_proposition(proposition: &str) -> String {
    format!(
        "{PROPOSITION_OPEN}{}{PROPOSITION_CLOSE}",
        escape_markup(proposition)
    )
}

/// Render propositions one element per line, in order.
pub fn format_propositions(propositions: &[String]) -> String {
    propositions
        .iter()
        .map(|p| format_proposition(p))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse `<proposition>` elements out of model output.
///
/// Whitespace around each proposition is trimmed and empty elements are
/// dropped. An empty `<propositions>` wrapper is a valid empty answer.
/// Everything else that doesn't parse cleanly is
/// [`SummarizerError::Malformed`]: prose with no markup, a wrapper that is
/// opened but never closed, or a `<proposition>` element without its
/// closing tag.
pub fn parse_propositions(text: &str) -> Result<Vec<String>, SummarizerError> {
    let elements: Vec<&str> = PROPOSITION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    let openers = text.matches(PROPOSITION_OPEN).count();
    if openers != elements.len() {
        return Err(SummarizerError::Malformed(format!(
            "{} of {openers} <proposition> elements are closed",
            elements.len()
        )));
    }

    let wrapped = text.contains(PROPOSITIONS_OPEN);
    let wrapper_closed = text.contains(PROPOSITIONS_CLOSE) || text.contains(PROPOSITIONS_EMPTY);
    if wrapped && !wrapper_closed {
        return Err(SummarizerError::Malformed(
            "<propositions> wrapper is never closed".into(),
        ));
    }
    if elements.is_empty() && !wrapped && !wrapper_closed {
        return Err(SummarizerError::Malformed(format!(
            "no <proposition> markup in {} chars of output",
            text.chars().count()
        )));
    }

    Ok(elements
        .into_iter()
        .map(|p| unescape_markup(p.trim()))
        .filter(|p| !p.is_empty())
        .collect())
}

fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_markup(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
