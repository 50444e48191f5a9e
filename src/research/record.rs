//! The structured output of the research pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::SearchHit;

/// Most quotes a record may hold.
pub const MAX_QUOTES: usize = 5;

/// Most trait descriptors a record may hold.
pub const MAX_TRAITS: usize = 10;

/// Style used when no document produced a style description.
pub const GENERIC_STYLE: &str = "Professional and direct communication style";

/// A trait descriptor tagged with the relevance score of the search hit it
/// came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTrait {
    pub descriptor: String,
    pub score: f64,
}

impl PersonalityTrait {
    pub fn new(descriptor: impl Into<String>, score: f64) -> Self {
        Self {
            descriptor: descriptor.into(),
            score,
        }
    }

    /// `"Score 0.90: descriptor"`.
    pub fn label(&self) -> String {
        format!("Score {:.2}: {}", self.score, self.descriptor)
    }
}

/// Everything known about a subject's personality.
///
/// Quote and trait caps are applied once, in [`RecordDraft::finish`]; a
/// record is never re-truncated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityRecord {
    pub subject: String,
    /// Verbatim quotes, at most [`MAX_QUOTES`].
    pub quotes: Vec<String>,
    pub talking_style: String,
    /// At most [`MAX_TRAITS`], highest score first.
    pub traits: Vec<PersonalityTrait>,
    /// URLs of the search hits the record was built from.
    pub sources: Vec<String>,
    /// Mean relevance of the search hits used, in `[0, 1]`.
    pub confidence: f64,
    /// Raw search hits kept for debugging.
    pub search_results: Vec<SearchHit>,
    /// Raw extracted document contents kept for debugging.
    pub extracted_content: Vec<String>,
    /// Reasons for every stage that degraded while building this record.
    pub diagnostics: Vec<String>,
    /// Set on records produced by the fallback path.
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl PersonalityRecord {
    /// Minimal record used when research produced nothing usable.
    pub fn fallback(
        subject: &str,
        diagnostics: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: subject.to_string(),
            quotes: Vec::new(),
            talking_style: format!(
                "{} appears to have a professional and direct communication style.",
                subject
            ),
            traits: vec![PersonalityTrait::new(
                "Professional approach to communication",
                0.0,
            )],
            sources: Vec::new(),
            confidence: 0.0,
            search_results: Vec::new(),
            extracted_content: Vec::new(),
            diagnostics,
            degraded: true,
            created_at,
        }
    }

    /// A record without a style description cannot drive a persona prompt.
    pub fn is_degenerate(&self) -> bool {
        self.talking_style.trim().is_empty()
    }
}

/// Uncapped record contents collected by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    pub subject: String,
    /// Quotes in extraction order.
    pub quotes: Vec<String>,
    pub talking_style: String,
    pub traits: Vec<PersonalityTrait>,
    pub sources: Vec<String>,
    pub confidence: f64,
    pub search_results: Vec<SearchHit>,
    pub extracted_content: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl RecordDraft {
    /// Apply the caps and stamp the creation time.
    ///
    /// Quotes keep extraction order (first ones win). Traits are ordered by
    /// score, highest first, preserving input order among equal scores.
    pub fn finish(self, created_at: DateTime<Utc>) -> PersonalityRecord {
        let mut quotes = self.quotes;
        quotes.truncate(MAX_QUOTES);

        let mut traits = self.traits;
        traits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        traits.truncate(MAX_TRAITS);

        PersonalityRecord {
            subject: self.subject,
            quotes,
            talking_style: self.talking_style,
            traits,
            sources: self.sources,
            confidence: self.confidence.clamp(0.0, 1.0),
            search_results: self.search_results,
            extracted_content: self.extracted_content,
            diagnostics: self.diagnostics,
            degraded: false,
            created_at,
        }
    }
}
