//! The research pipeline.
//!
//! ```text
//! cache check
//!   → primary search (quote-oriented)
//!   → fallback search (style-oriented, only if the primary found nothing usable)
//!   → rank by score, keep top-N
//!   → extract full content
//!   → per-document quote/style distillation
//!   → synthesis into a PersonalityRecord
//!   → cache write
//! ```
//!
//! Provider failures in the search and extraction stages turn the whole run
//! into the fallback record. A failing or unparseable distillation only
//! removes that one document's contribution. `research` itself never fails.

use std::cmp::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::cache::{CacheInfo, Clock, SystemClock, TtlCache};
use crate::config::ResearchConfig;
use crate::error::ProviderError;
use crate::providers::{
    CompletionProvider, ExtractedDocument, ExtractionProvider, SearchHit, SearchProvider,
};
use crate::research::extraction::{
    build_extraction_messages, parse_extraction_response, DocumentDistillation,
};
use crate::research::outcome::StageOutcome;
use crate::research::record::{PersonalityRecord, PersonalityTrait, RecordDraft, GENERIC_STYLE};

/// Words in a hit's title or snippet that mark it as describing personality.
const TRAIT_KEYWORDS: [&str; 5] = ["philosophy", "thinking", "style", "personality", "approach"];

/// Query biased toward first-person quotes and stated opinions.
pub fn primary_query(subject: &str) -> String {
    format!(
        "{} quotes that were said by themself and reflect their personality and way of thinking",
        subject
    )
}

/// Query biased toward descriptions of how the subject communicates.
pub fn fallback_query(subject: &str) -> String {
    format!("{} talking style personality communication", subject)
}

/// The three external collaborators the pipeline talks to.
#[derive(Debug, Clone)]
pub struct ResearchProviders {
    pub search: Arc<dyn SearchProvider>,
    pub extractor: Arc<dyn ExtractionProvider>,
    pub completion: Arc<dyn CompletionProvider>,
}

/// A record plus where it came from.
#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub record: Arc<PersonalityRecord>,
    pub from_cache: bool,
}

/// Builds and caches personality records.
#[derive(Debug)]
pub struct PersonalityResearcher {
    config: ResearchConfig,
    providers: ResearchProviders,
    cache: TtlCache<Arc<PersonalityRecord>>,
    search_cache: TtlCache<Vec<SearchHit>>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    clock: Arc<dyn Clock>,
}

impl PersonalityResearcher {
    pub fn new(config: ResearchConfig, providers: ResearchProviders) -> Self {
        Self::with_clock(config, providers, Arc::new(SystemClock))
    }

    /// Construct with an injected clock shared by both caches and record
    /// timestamps.
    pub fn with_clock(
        config: ResearchConfig,
        providers: ResearchProviders,
        clock: Arc<dyn Clock>,
    ) -> Self {
        log::info!(
            "Initialized researcher: max_results={}, max_extract={}, cache_ttl={}s",
            config.max_search_results,
            config.max_extract_results,
            config.personality_ttl_secs
        );

        Self {
            cache: TtlCache::with_clock(config.personality_ttl_secs, Arc::clone(&clock)),
            search_cache: TtlCache::with_clock(config.search_ttl_secs, Arc::clone(&clock)),
            inflight: DashMap::new(),
            config,
            providers,
            clock,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// The personality cache, keyed by subject.
    pub fn cache(&self) -> &TtlCache<Arc<PersonalityRecord>> {
        &self.cache
    }

    /// A fresh cached record, if any.
    pub fn cached(&self, subject: &str) -> Option<Arc<PersonalityRecord>> {
        self.cache.get(subject)
    }

    /// Forget the cached record for `subject`.
    pub fn invalidate(&self, subject: &str) -> bool {
        let removed = self.cache.invalidate(subject);
        if removed {
            log::info!("Cleared cache for {}", subject);
        }
        removed
    }

    /// Forget every cached record and search result.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.search_cache.invalidate_all();
        log::info!("Cleared all cache");
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.cache.snapshot()
    }

    /// Research `subject`, returning a cached record when one is fresh.
    pub async fn research(&self, subject: &str) -> Arc<PersonalityRecord> {
        self.research_report(subject).await.record
    }

    /// Like [`research`](Self::research) but also reports cache provenance.
    ///
    /// Concurrent calls for the same subject are serialized; a caller that
    /// waited on another finds that caller's result in the cache.
    pub async fn research_report(&self, subject: &str) -> ResearchReport {
        if let Some(record) = self.cache.get(subject) {
            log::info!("Using cached data for {}", subject);
            return ResearchReport {
                record,
                from_cache: true,
            };
        }

        let lock = self.subject_lock(subject);
        let _guard = lock.lock().await;

        if let Some(record) = self.cache.get(subject) {
            log::info!("Using data cached by a concurrent research for {}", subject);
            return ResearchReport {
                record,
                from_cache: true,
            };
        }

        log::info!("Starting research for {}", subject);
        let record = Arc::new(self.run_pipeline(subject).await);
        self.cache
            .put(subject, Arc::clone(&record), self.config.personality_ttl_secs);
        log::info!(
            "Research completed for {} (confidence {:.2}, {} quotes{})",
            subject,
            record.confidence,
            record.quotes.len(),
            if record.degraded { ", fallback" } else { "" }
        );

        ResearchReport {
            record,
            from_cache: false,
        }
    }

    fn subject_lock(&self, subject: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.inflight.entry(subject.to_string()).or_default().value())
    }

    async fn run_pipeline(&self, subject: &str) -> PersonalityRecord {
        let mut diagnostics = Vec::new();

        let hits = match self.gather_hits(subject).await {
            Ok(hits) if hits.is_empty() => {
                log::warn!("No search results found for {}", subject);
                diagnostics.push(format!("No usable search results found for {}", subject));
                return self.fallback(subject, diagnostics);
            }
            Ok(hits) => hits,
            Err(err) => {
                log::error!("Search failed for {}: {}", subject, err);
                diagnostics.push(format!("Search failed: {}", err));
                return self.fallback(subject, diagnostics);
            }
        };

        let documents = match self.extract_documents(&hits).await {
            Ok(documents) => documents,
            Err(err) => {
                log::error!("Content extraction failed for {}: {}", subject, err);
                diagnostics.push(format!("Content extraction failed: {}", err));
                return self.fallback(subject, diagnostics);
            }
        };

        let mut distillations = Vec::with_capacity(documents.len());
        for document in &documents {
            distillations.push(self.distill(subject, document).await);
        }

        let draft = synthesize_draft(subject, hits, documents, distillations, diagnostics);
        draft.finish(self.clock.now())
    }

    fn fallback(&self, subject: &str, diagnostics: Vec<String>) -> PersonalityRecord {
        PersonalityRecord::fallback(subject, diagnostics, self.clock.now())
    }

    /// Primary search, then the fallback search if nothing usable came back,
    /// then ranking and truncation.
    async fn gather_hits(&self, subject: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let primary = primary_query(subject);
        log::info!("Primary search: '{}'", primary);
        let mut hits = self.search_with_urls(&primary).await?;

        if hits.is_empty() {
            let fallback = fallback_query(subject);
            log::info!("No URLs found, trying fallback search: '{}'", fallback);
            hits = self.search_with_urls(&fallback).await?;
        }

        Ok(rank_hits(hits, self.config.max_extract_results))
    }

    async fn search_with_urls(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        if self.config.cache_search_results {
            if let Some(hits) = self.search_cache.get(query) {
                log::debug!("Using cached search results for '{}'", query);
                return Ok(hits);
            }
        }

        let hits: Vec<SearchHit> = self
            .providers
            .search
            .search(query, self.config.max_search_results, self.config.search_depth)
            .await?
            .into_iter()
            .filter(SearchHit::has_url)
            .collect();

        if self.config.cache_search_results {
            self.search_cache
                .put(query, hits.clone(), self.config.search_ttl_secs);
        }

        Ok(hits)
    }

    async fn extract_documents(
        &self,
        hits: &[SearchHit],
    ) -> Result<Vec<ExtractedDocument>, ProviderError> {
        let urls: Vec<String> = hits.iter().map(|hit| hit.url.clone()).collect();
        log::info!("Extracting content from {} URLs", urls.len());

        let documents: Vec<ExtractedDocument> = self
            .providers
            .extractor
            .extract(&urls)
            .await?
            .into_iter()
            .filter(|doc| !doc.raw_content.trim().is_empty())
            .collect();

        log::info!("Successfully extracted {} content pieces", documents.len());
        Ok(documents)
    }

    async fn distill(
        &self,
        subject: &str,
        document: &ExtractedDocument,
    ) -> StageOutcome<DocumentDistillation> {
        let messages =
            build_extraction_messages(subject, &document.raw_content, self.config.max_content_chars);

        match self.providers.completion.complete(&messages).await {
            Ok(text) => match parse_extraction_response(&text) {
                StageOutcome::Degraded { value, reason } => StageOutcome::degraded(
                    value,
                    format!("{} ({})", reason, document.url),
                ),
                ok => ok,
            },
            Err(err) => StageOutcome::degraded(
                DocumentDistillation::default(),
                format!("Quote extraction failed for {}: {}", document.url, err),
            ),
        }
    }
}

/// Stable sort by score, highest first, then keep the first `limit`.
pub fn rank_hits(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(limit);
    hits
}

/// One style passes through; several are joined; none gives the generic line.
pub fn combine_styles(styles: &[String]) -> String {
    match styles {
        [] => GENERIC_STYLE.to_string(),
        [only] => only.clone(),
        many => format!("Communication style: {}", many.join("; ")),
    }
}

/// Traits from hits whose title or snippet talks about personality.
pub fn traits_from_hits(hits: &[SearchHit]) -> Vec<PersonalityTrait> {
    hits.iter()
        .filter(|hit| {
            let title = hit.title.to_lowercase();
            let content = hit.content.to_lowercase();
            TRAIT_KEYWORDS
                .iter()
                .any(|kw| title.contains(kw) || content.contains(kw))
        })
        .map(|hit| PersonalityTrait::new(hit.title.clone(), hit.score))
        .collect()
}

/// Mean score of the hits actually used, 0.0 when there are none.
pub fn mean_score(hits: &[SearchHit]) -> f64 {
    if hits.is_empty() {
        0.0
    } else {
        hits.iter().map(|hit| hit.score).sum::<f64>() / hits.len() as f64
    }
}

fn synthesize_draft(
    subject: &str,
    hits: Vec<SearchHit>,
    documents: Vec<ExtractedDocument>,
    distillations: Vec<StageOutcome<DocumentDistillation>>,
    mut diagnostics: Vec<String>,
) -> RecordDraft {
    let mut quotes = Vec::new();
    let mut styles = Vec::new();

    for outcome in distillations {
        let (distillation, reason) = outcome.into_parts();
        if let Some(reason) = reason {
            log::warn!("{}", reason);
            diagnostics.push(reason);
        }
        quotes.extend(distillation.quotes.into_iter().map(|q| q.quote));
        styles.extend(distillation.communication_style);
    }

    log::info!(
        "Total quotes extracted from all content for {}: {}",
        subject,
        quotes.len()
    );

    RecordDraft {
        subject: subject.to_string(),
        quotes,
        talking_style: combine_styles(&styles),
        traits: traits_from_hits(&hits),
        sources: hits.iter().map(|hit| hit.url.clone()).collect(),
        confidence: mean_score(&hits),
        search_results: hits,
        extracted_content: documents.into_iter().map(|doc| doc.raw_content).collect(),
        diagnostics,
    }
}
