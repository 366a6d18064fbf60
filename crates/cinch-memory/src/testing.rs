//! Scripted summarizer for unit tests.

use crate::summarizer::{Summarizer, SummarizerError, SummarizerFuture, parse_propositions};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

enum Reply<T> {
    Value(T),
    Fail(SummarizerError),
    Hang,
}

impl<T: Send + 'static> Reply<T> {
    fn into_future(self) -> SummarizerFuture<'static, T> {
        match self {
            Reply::Value(v) => Box::pin(async move { Ok(v) }),
            Reply::Fail(e) => Box::pin(async move { Err(e) }),
            Reply::Hang => Box::pin(std::future::pending()),
        }
    }
}

/// Replies are consumed in the order they were scripted. When a queue runs
/// dry: `summarize` and `condense_propositions` fail as unavailable,
/// `extract_propositions` finds nothing.
#[derive(Default)]
pub(crate) struct FakeSummarizer {
    summaries: Mutex<VecDeque<Reply<String>>>,
    extractions: Mutex<VecDeque<Reply<Vec<String>>>>,
    condensations: Mutex<VecDeque<Reply<Vec<String>>>>,
    summarize_calls: AtomicUsize,
    extract_calls: AtomicUsize,
    condense_calls: AtomicUsize,
    last_budget: Mutex<Option<usize>>,
    last_existing: Mutex<Vec<String>>,
    last_transcript: Mutex<String>,
    last_condense_input: Mutex<(Vec<String>, usize)>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl FakeSummarizer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push<T>(queue: &Mutex<VecDeque<Reply<T>>>, reply: Reply<T>) {
        queue.lock().unwrap().push_back(reply);
    }

    pub(crate) fn summary(self, text: impl Into<String>) -> Self {
        Self::push(&self.summaries, Reply::Value(text.into()));
        self
    }

    pub(crate) fn summary_error(self, error: SummarizerError) -> Self {
        Self::push(&self.summaries, Reply::Fail(error));
        self
    }

    pub(crate) fn summary_hang(self) -> Self {
        Self::push(&self.summaries, Reply::Hang);
        self
    }

    pub(crate) fn extraction(self, propositions: &[&str]) -> Self {
        Self::push(&self.extractions, Reply::Value(strings(propositions)));
        self
    }

    pub(crate) fn extraction_error(self, error: SummarizerError) -> Self {
        Self::push(&self.extractions, Reply::Fail(error));
        self
    }

    pub(crate) fn condensation(self, propositions: &[&str]) -> Self {
        Self::push(&self.condensations, Reply::Value(strings(propositions)));
        self
    }

    pub(crate) fn condensation_error(self, error: SummarizerError) -> Self {
        Self::push(&self.condensations, Reply::Fail(error));
        self
    }

    /// Queue a raw model reply; the condensation yields whatever parsing it
    /// produces.
    pub(crate) fn condensation_markup(self, markup: &str) -> Self {
        let reply = match parse_propositions(markup) {
            Ok(propositions) => Reply::Value(propositions),
            Err(e) => Reply::Fail(e),
        };
        Self::push(&self.condensations, reply);
        self
    }

    pub(crate) fn condensation_hang(self) -> Self {
        Self::push(&self.condensations, Reply::Hang);
        self
    }

    pub(crate) fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn condense_calls(&self) -> usize {
        self.condense_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_summarize_budget(&self) -> Option<usize> {
        *self.last_budget.lock().unwrap()
    }

    pub(crate) fn last_existing(&self) -> Vec<String> {
        self.last_existing.lock().unwrap().clone()
    }

    pub(crate) fn last_transcript(&self) -> String {
        self.last_transcript.lock().unwrap().clone()
    }

    pub(crate) fn last_condense_input(&self) -> (Vec<String>, usize) {
        self.last_condense_input.lock().unwrap().clone()
    }
}

impl Summarizer for FakeSummarizer {
    fn summarize<'a>(&'a self, _text: &'a str, max_chars: usize) -> SummarizerFuture<'a, String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_budget.lock().unwrap() = Some(max_chars);
        self.summaries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Fail(SummarizerError::Unavailable("no scripted summary".into())))
            .into_future()
    }

    fn extract_propositions<'a>(
        &'a self,
        existing: &'a [String],
        new_text: &'a str,
    ) -> SummarizerFuture<'a, Vec<String>> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_existing.lock().unwrap() = existing.to_vec();
        *self.last_transcript.lock().unwrap() = new_text.to_string();
        self.extractions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Value(Vec::new()))
            .into_future()
    }

    fn condense_propositions<'a>(
        &'a self,
        current: &'a [String],
        cap: usize,
    ) -> SummarizerFuture<'a, Vec<String>> {
        self.condense_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_condense_input.lock().unwrap() = (current.to_vec(), cap);
        self.condensations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Reply::Fail(SummarizerError::Unavailable("no scripted condensation".into()))
            })
            .into_future()
    }
}
