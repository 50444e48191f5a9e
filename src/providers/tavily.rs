//! Tavily search and extract client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::providers::{ExtractedDocument, ExtractionProvider, SearchDepth, SearchHit, SearchProvider};

const PROVIDER: &str = "tavily";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    results: Vec<ExtractedDocument>,
    #[serde(default)]
    failed_results: Vec<Value>,
}

/// Client for Tavily's `/search` and `/extract` endpoints.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    api_key: String,
    pub base_url: String,
    /// `basic` or `advanced`, forwarded as `extract_depth`.
    pub extract_depth: SearchDepth,
    pub include_images: bool,
    pub timeout_secs: u64,
    client: reqwest::Client,
}

impl TavilyClient {
    pub fn new(
        api_key: impl Into<String>,
        extract_depth: SearchDepth,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, timeout_secs, e))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            extract_depth,
            include_images: false,
            timeout_secs,
            client,
        })
    }

    pub fn with_include_images(mut self, include_images: bool) -> Self {
        self.include_images = include_images;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn build_search_body(&self, query: &str, max_results: usize, depth: SearchDepth) -> Value {
        serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": depth.as_str(),
            "topic": "general",
        })
    }

    pub fn build_extract_body(&self, urls: &[String]) -> Value {
        serde_json::json!({
            "api_key": self.api_key,
            "urls": urls,
            "extract_depth": self.extract_depth.as_str(),
            "include_images": self.include_images,
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<String, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey {
                provider: PROVIDER.to_string(),
            });
        }

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, self.timeout_secs, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, self.timeout_secs, e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            });
        }

        Ok(text)
    }
}

fn malformed(err: serde_json::Error) -> ProviderError {
    ProviderError::Malformed {
        provider: PROVIDER.to_string(),
        message: err.to_string(),
    }
}

/// Parse a `/search` response body.
pub fn parse_search_response(text: &str) -> Result<Vec<SearchHit>, ProviderError> {
    let parsed: SearchResponse = serde_json::from_str(text).map_err(malformed)?;
    Ok(parsed.results)
}

/// Parse an `/extract` response body, dropping failed URLs.
pub fn parse_extract_response(text: &str) -> Result<Vec<ExtractedDocument>, ProviderError> {
    let parsed: ExtractResponse = serde_json::from_str(text).map_err(malformed)?;
    for failed in &parsed.failed_results {
        log::debug!("Tavily could not extract {}", failed);
    }
    Ok(parsed.results)
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        log::debug!("Tavily search: query='{}', max_results={}", query, max_results);
        let body = self.build_search_body(query, max_results, depth);
        let text = self.post_json("search", &body).await?;
        parse_search_response(&text)
    }
}

#[async_trait]
impl ExtractionProvider for TavilyClient {
    async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedDocument>, ProviderError> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        log::debug!("Tavily extract: {} urls", urls.len());
        let body = self.build_extract_body(urls);
        let text = self.post_json("extract", &body).await?;
        parse_extract_response(&text)
    }
}
