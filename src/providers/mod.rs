//! External collaborator contracts and their HTTP implementations.
//!
//! The core only ever talks to the three traits below. Concrete clients:
//!
//! | Concern | Trait | Client |
//! |---------|-------|--------|
//! | Web search | [`SearchProvider`] | [`tavily::TavilyClient`] |
//! | Content extraction | [`ExtractionProvider`] | [`tavily::TavilyClient`] |
//! | Chat completion | [`CompletionProvider`] | [`openai::OpenAiChat`] |
//!
//! Timeouts are enforced inside the clients and surface as
//! [`ProviderError::Timeout`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ProviderError};
use crate::types::ConversationMessage;

pub mod openai;
pub mod tavily;

pub use openai::OpenAiChat;
pub use tavily::TavilyClient;

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// One hit returned by a search provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    /// Source locator. Hits without one are unusable for extraction.
    #[serde(default)]
    pub url: String,
    /// Short snippet of the page content.
    #[serde(default, alias = "content_snippet")]
    pub content: String,
    /// Provider-supplied relevance score.
    #[serde(default)]
    pub score: f64,
}

impl SearchHit {
    pub fn has_url(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Full content fetched for one URL.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub url: String,
    #[serde(default)]
    pub raw_content: String,
}

/// How much effort the search provider should spend per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

impl FromStr for SearchDepth {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            other => Err(ConfigError::Invalid {
                key: "depth".to_string(),
                message: format!("expected 'basic' or 'advanced', got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for SearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Web search.
///
/// May return zero hits. Implementations must not block indefinitely.
#[async_trait]
pub trait SearchProvider: Send + Sync + fmt::Debug {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Full-content extraction.
///
/// Partial results are allowed: URLs that fail are simply omitted.
#[async_trait]
pub trait ExtractionProvider: Send + Sync + fmt::Debug {
    async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedDocument>, ProviderError>;
}

/// Language-model completion over a message list.
#[async_trait]
pub trait CompletionProvider: Send + Sync + fmt::Debug {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    async fn complete(&self, messages: &[ConversationMessage]) -> Result<String, ProviderError>;
}
