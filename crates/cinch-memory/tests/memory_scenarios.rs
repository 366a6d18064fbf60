//! End-to-end behaviour of memory blocks through the public API.

use cinch_memory::prelude::*;
use cinch_memory::summarizer::SummarizerFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Deterministic summarizer: `summarize` keeps the first `max_chars`
/// characters, extraction replays a script, condensation keeps the newest
/// `cap` propositions. Either side can be switched to fail.
#[derive(Default)]
struct ScriptedSummarizer {
    extractions: Mutex<VecDeque<Vec<String>>>,
    fail_summaries: bool,
    fail_condensation: bool,
    summarize_calls: AtomicUsize,
    condense_calls: AtomicUsize,
}

impl ScriptedSummarizer {
    fn with_extractions(batches: &[&[&str]]) -> Self {
        Self {
            extractions: Mutex::new(
                batches
                    .iter()
                    .map(|b| b.iter().map(|s| s.to_string()).collect())
                    .collect(),
            ),
            ..Default::default()
        }
    }
}

impl Summarizer for ScriptedSummarizer {
    fn summarize<'a>(&'a self, text: &'a str, max_chars: usize) -> SummarizerFuture<'a, String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_summaries;
        Box::pin(async move {
            if fail {
                return Err(SummarizerError::Unavailable("503 Service Unavailable".into()));
            }
            Ok(text.chars().take(max_chars).collect())
        })
    }

    fn extract_propositions<'a>(
        &'a self,
        _existing: &'a [String],
        _new_text: &'a str,
    ) -> SummarizerFuture<'a, Vec<String>> {
        let next = self.extractions.lock().unwrap().pop_front().unwrap_or_default();
        Box::pin(async move { Ok(next) })
    }

    fn condense_propositions<'a>(
        &'a self,
        current: &'a [String],
        cap: usize,
    ) -> SummarizerFuture<'a, Vec<String>> {
        self.condense_calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_condensation;
        Box::pin(async move {
            if fail {
                return Err(SummarizerError::Timeout(Duration::from_secs(1)));
            }
            let skip = current.len().saturating_sub(cap);
            Ok(current[skip..].to_vec())
        })
    }
}

fn condensed(limit: usize, summarizer: Arc<ScriptedSummarizer>) -> MemoryBlockKind {
    let config = BlockConfig::condensed("session", CondensedConfig::default().with_token_limit(limit));
    MemoryBlockKind::from_config(&config, summarizer, Arc::new(CharMeter))
}

fn proposition(max: usize, summarizer: Arc<ScriptedSummarizer>) -> MemoryBlockKind {
    let config =
        BlockConfig::proposition("facts", PropositionConfig::default().with_max_propositions(max));
    MemoryBlockKind::from_config(&config, summarizer, Arc::new(CharMeter))
}

fn twenty(c: char) -> String {
    std::iter::repeat_n(c, 20).collect()
}

#[tokio::test]
async fn condensed_keeps_newest_fragments_within_limit() {
    let mut block = condensed(50, Arc::new(ScriptedSummarizer::default()));
    let messages: Vec<ChatMessage> = ['a', 'b', 'c']
        .into_iter()
        .map(|c| ChatMessage::user(twenty(c)))
        .collect();

    block.ingest(&messages).await;

    assert_eq!(block.len(), 2);
    assert_eq!(block.render(), format!("{}\n{}", twenty('b'), twenty('c')));
    assert!(block.stats().measured.unwrap() <= 50);
}

#[tokio::test]
async fn condensed_capacity_holds_across_many_batches() {
    let summarizer = Arc::new(ScriptedSummarizer::default());
    let mut block = condensed(400, summarizer.clone());

    for round in 0..30 {
        let long = format!("round {round}: {}", "detail ".repeat(40));
        let batch = vec![
            ChatMessage::user(format!("question {round}")),
            ChatMessage::assistant_text(long),
        ];
        block.ingest(&batch).await;

        let stats = block.stats();
        assert!(
            stats.measured.unwrap() <= 400 || stats.items == 1,
            "round {round}: {}",
            stats.to_log_string()
        );
    }

    assert_eq!(summarizer.summarize_calls.load(Ordering::SeqCst), 30);
    let rendered = block.render();
    assert!(rendered.contains("question 29"));
    assert!(!rendered.contains("question 0\n"));
}

#[tokio::test]
async fn condensed_preserves_ingestion_order() {
    let mut block = condensed(10_000, Arc::new(ScriptedSummarizer::default()));
    for i in 0..5 {
        block.ingest(&[ChatMessage::user(format!("m{i}"))]).await;
    }
    assert_eq!(block.render(), "m0\nm1\nm2\nm3\nm4");
}

#[tokio::test]
async fn condensed_failure_leaves_state_unchanged() {
    let summarizer = Arc::new(ScriptedSummarizer {
        fail_summaries: true,
        ..Default::default()
    });
    let mut block = condensed(10_000, summarizer.clone());
    block.ingest(&[ChatMessage::user("short and kept")]).await;
    let before = block.render();

    block
        .ingest(&[ChatMessage::assistant_text("x".repeat(500))])
        .await;

    assert_eq!(summarizer.summarize_calls.load(Ordering::SeqCst), 1);
    assert_eq!(block.render(), before);
    assert_eq!(block.len(), 1);
}

#[tokio::test]
async fn empty_ingest_is_noop_for_both_strategies() {
    let summarizer = Arc::new(ScriptedSummarizer::default());
    for mut block in [condensed(50, summarizer.clone()), proposition(2, summarizer.clone())] {
        block.ingest(&[]).await;
        assert!(block.is_empty());
        assert_eq!(block.render(), "");
    }
}

#[tokio::test]
async fn proposition_over_cap_is_condensed() {
    let summarizer = Arc::new(ScriptedSummarizer::with_extractions(&[&[
        "User lives in Oslo",
        "User owns a cat",
        "User prefers tea",
    ]]));
    let mut block = proposition(2, summarizer.clone());

    block
        .ingest(&[ChatMessage::user("I live in Oslo with my cat and I drink tea.")])
        .await;

    assert_eq!(summarizer.condense_calls.load(Ordering::SeqCst), 1);
    assert_eq!(block.len(), 2);
    assert_eq!(
        block.render(),
        "<proposition>User owns a cat</proposition>\n<proposition>User prefers tea</proposition>"
    );
}

#[tokio::test]
async fn proposition_condensation_failure_truncates_oldest() {
    let summarizer = Arc::new(ScriptedSummarizer {
        fail_condensation: true,
        ..ScriptedSummarizer::with_extractions(&[&["a", "b"], &["c", "d"]])
    });
    let mut block = proposition(3, summarizer.clone());

    block.ingest(&[ChatMessage::user("first")]).await;
    assert_eq!(block.len(), 2);
    block.ingest(&[ChatMessage::user("second")]).await;

    assert_eq!(block.len(), 3);
    assert_eq!(
        block.render(),
        "<proposition>b</proposition>\n<proposition>c</proposition>\n<proposition>d</proposition>"
    );
}

#[tokio::test]
async fn render_is_idempotent() {
    let summarizer = Arc::new(ScriptedSummarizer::with_extractions(&[&["fact"]]));
    let mut facts = proposition(5, summarizer.clone());
    let mut session = condensed(100, summarizer);
    let batch = [ChatMessage::user("remember this")];
    facts.ingest(&batch).await;
    session.ingest(&batch).await;

    for block in [&facts, &session] {
        let first = block.render();
        assert_eq!(block.render(), first);
        assert_eq!(block.stats(), block.stats());
    }
}

#[tokio::test]
async fn shared_block_serializes_concurrent_ingests() {
    let shared = SharedMemoryBlock::new(condensed(10_000, Arc::new(ScriptedSummarizer::default())));

    let mut handles = Vec::new();
    for i in 0..8 {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            shared.ingest(&[ChatMessage::user(format!("task {i}"))]).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let rendered = shared.render().await;
    assert_eq!(rendered.lines().count(), 8);
    assert_eq!(shared.stats().await.items, 8);
}
