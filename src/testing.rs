//! Scripted provider doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ProviderError;
use crate::providers::{
    CompletionProvider, ExtractedDocument, ExtractionProvider, SearchDepth, SearchHit,
    SearchProvider,
};
use crate::types::ConversationMessage;

pub fn hit(title: &str, url: &str, score: f64) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: url.to_string(),
        content: String::new(),
        score,
    }
}

/// An extraction-model answer in the expected JSON shape.
pub fn extraction_json(style: &str, quotes: &[&str]) -> String {
    let quotes: Vec<serde_json::Value> = quotes
        .iter()
        .map(|q| serde_json::json!({"quote": q, "context": "test", "significance": "test"}))
        .collect();
    serde_json::json!({"communication_style": style, "quotes": quotes}).to_string()
}

fn unavailable(provider: &str) -> ProviderError {
    ProviderError::Unavailable {
        provider: provider.to_string(),
        message: "scripted failure".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Returns scripted hits per query; unknown queries return nothing.
#[derive(Debug, Default)]
pub struct MockSearch {
    results: HashMap<String, Vec<SearchHit>>,
    delay_ms: u64,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results.insert(query.to_string(), hits);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn calls_for(&self, query: &str) -> usize {
        self.queries.lock().iter().filter(|q| *q == query).count()
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(
        &self,
        query: &str,
        _max_results: usize,
        _depth: SearchDepth,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        self.queries.lock().push(query.to_string());
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

#[derive(Debug)]
pub struct FailingSearch;

#[async_trait]
impl SearchProvider for FailingSearch {
    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
        _depth: SearchDepth,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        Err(unavailable("search"))
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Returns scripted content per URL; unknown URLs are omitted unless a
/// default is set.
#[derive(Debug, Default)]
pub struct MockExtractor {
    content: HashMap<String, String>,
    default_content: Option<String>,
    calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, url: &str, content: &str) -> Self {
        self.content.insert(url.to_string(), content.to_string());
        self
    }

    pub fn with_default_content(mut self, content: &str) -> Self {
        self.default_content = Some(content.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionProvider for MockExtractor {
    async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedDocument>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(urls
            .iter()
            .filter_map(|url| {
                self.content
                    .get(url)
                    .or(self.default_content.as_ref())
                    .map(|content| ExtractedDocument {
                        url: url.clone(),
                        raw_content: content.clone(),
                    })
            })
            .collect())
    }
}

#[derive(Debug)]
pub struct FailingExtractor;

#[async_trait]
impl ExtractionProvider for FailingExtractor {
    async fn extract(&self, _urls: &[String]) -> Result<Vec<ExtractedDocument>, ProviderError> {
        Err(unavailable("extract"))
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Answers with the first rule whose needle appears in the last message,
/// then the default reply, otherwise fails.
#[derive(Debug, Default)]
pub struct MockCompletion {
    rules: Vec<(String, String)>,
    default_reply: Option<String>,
    failing: AtomicBool,
    received: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_when(mut self, needle: &str, reply: impl Into<String>) -> Self {
        self.rules.push((needle.to_string(), reply.into()));
        self
    }

    pub fn with_default_reply(mut self, reply: &str) -> Self {
        self.default_reply = Some(reply.to_string());
        self
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.received.lock().len()
    }

    /// Message lists received so far, in call order.
    pub fn received(&self) -> Vec<Vec<ConversationMessage>> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletion {
    fn model(&self) -> &str {
        "mock"
    }

    async fn complete(&self, messages: &[ConversationMessage]) -> Result<String, ProviderError> {
        self.received.lock().push(messages.to_vec());
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("completion"));
        }

        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        self.rules
            .iter()
            .find(|(needle, _)| last.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.default_reply.clone())
            .ok_or_else(|| unavailable("completion"))
    }
}

#[derive(Debug)]
pub struct FailingCompletion;

#[async_trait]
impl CompletionProvider for FailingCompletion {
    fn model(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _messages: &[ConversationMessage]) -> Result<String, ProviderError> {
        Err(unavailable("completion"))
    }
}
