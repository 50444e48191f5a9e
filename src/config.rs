//! Configuration for the research pipeline, the chat orchestrator and the
//! server binary.
//!
//! Everything is read once from the environment at construction time;
//! nothing in the core re-reads configuration afterwards.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::providers::SearchDepth;

/// Default personality TTL: 24 hours.
pub const DEFAULT_PERSONALITY_TTL_SECS: u64 = 24 * 60 * 60;

/// Default raw search-result TTL: 1 hour.
pub const DEFAULT_SEARCH_TTL_SECS: u64 = 60 * 60;

/// Longest accepted cache TTL: 10 years.
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Default history cap (10 exchanges).
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Settings consumed by [`PersonalityResearcher`](crate::research::PersonalityResearcher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    pub tavily_api_key: String,
    /// Hits requested per search query.
    pub max_search_results: usize,
    /// Top-ranked hits kept for content extraction.
    pub max_extract_results: usize,
    pub search_depth: SearchDepth,
    pub extract_depth: SearchDepth,
    pub personality_ttl_secs: u64,
    pub search_ttl_secs: u64,
    /// Reuse raw search hits across research runs within `search_ttl_secs`.
    pub cache_search_results: bool,
    /// Forwarded to the extraction provider.
    pub include_images: bool,
    pub extraction_model: String,
    pub extraction_temperature: f64,
    pub extraction_max_tokens: u32,
    /// Characters of each document embedded in the extraction prompt.
    pub max_content_chars: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: String::new(),
            max_search_results: 5,
            max_extract_results: 2,
            search_depth: SearchDepth::Basic,
            extract_depth: SearchDepth::Advanced,
            personality_ttl_secs: DEFAULT_PERSONALITY_TTL_SECS,
            search_ttl_secs: DEFAULT_SEARCH_TTL_SECS,
            cache_search_results: false,
            include_images: false,
            extraction_model: "gpt-4o-mini".to_string(),
            extraction_temperature: 0.1,
            extraction_max_tokens: 1000,
            max_content_chars: 8000,
        }
    }
}

/// Settings consumed by [`ChatOrchestrator`](crate::chat::ChatOrchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Stored history cap in messages. Must be even.
    pub max_history: usize,
    /// When off, subjects get the generic persona and no provider is called.
    pub enable_personality_research: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: None,
            max_history: DEFAULT_MAX_HISTORY,
            enable_personality_research: true,
        }
    }
}

/// Top-level configuration for the server binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub provider_timeout_secs: u64,
    pub port: u16,
    pub research: ResearchConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    /// Load from process environment variables and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup and validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::Missing(key.to_string()))
        };

        let tavily_api_key = required("TAVILY_API_KEY")?;
        let openai_api_key = required("OPENAI_API_KEY")?;

        let research_defaults = ResearchConfig::default();
        let research = ResearchConfig {
            tavily_api_key,
            max_search_results: parse_or(&lookup, "TAVILY_MAX_SEARCH_RESULTS", research_defaults.max_search_results)?,
            max_extract_results: parse_or(&lookup, "TAVILY_MAX_EXTRACT_RESULTS", research_defaults.max_extract_results)?,
            search_depth: parse_or(&lookup, "TAVILY_SEARCH_DEPTH", research_defaults.search_depth)?,
            extract_depth: parse_or(&lookup, "TAVILY_EXTRACT_DEPTH", research_defaults.extract_depth)?,
            personality_ttl_secs: parse_or(&lookup, "TAVILY_CACHE_TTL", research_defaults.personality_ttl_secs)?,
            search_ttl_secs: parse_or(&lookup, "SEARCH_CACHE_TTL", research_defaults.search_ttl_secs)?,
            cache_search_results: parse_bool_or(&lookup, "SEARCH_CACHE_ENABLE", research_defaults.cache_search_results),
            include_images: parse_bool_or(&lookup, "TAVILY_INCLUDE_IMAGES", research_defaults.include_images),
            extraction_model: lookup("EXTRACTION_MODEL").unwrap_or(research_defaults.extraction_model),
            ..research_defaults
        };

        let chat_defaults = ChatConfig::default();
        let max_tokens: u32 = parse_or(&lookup, "OPENAI_MAX_TOKENS", 0)?;
        let chat = ChatConfig {
            model: lookup("OPENAI_MODEL").unwrap_or(chat_defaults.model),
            temperature: parse_or(&lookup, "OPENAI_TEMPERATURE", chat_defaults.temperature)?,
            max_tokens: (max_tokens > 0).then_some(max_tokens),
            max_history: parse_or(&lookup, "CHAT_MAX_HISTORY", chat_defaults.max_history)?,
            enable_personality_research: parse_bool_or(&lookup, "ENABLE_PERSONALITY_RESEARCH", chat_defaults.enable_personality_research),
        };

        let config = Self {
            openai_api_key,
            openai_base_url: lookup("OPENAI_BASE_URL").filter(|v| !v.trim().is_empty()),
            provider_timeout_secs: parse_or(&lookup, "PROVIDER_TIMEOUT_SECS", 60)?,
            port: parse_or(&lookup, "PORT", 8000)?,
            research,
            chat,
        };

        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.research.tavily_api_key.trim().is_empty() {
            errors.push("TAVILY_API_KEY is required".to_string());
        }
        if self.openai_api_key.trim().is_empty() {
            errors.push("OPENAI_API_KEY is required".to_string());
        }
        errors.extend(self.research.problems());
        errors.extend(self.chat.problems());
        if self.provider_timeout_secs == 0 {
            errors.push("provider timeout must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

impl ResearchConfig {
    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_search_results == 0 {
            errors.push("max_search_results must be positive".to_string());
        }
        if self.max_extract_results == 0 {
            errors.push("max_extract_results must be positive".to_string());
        }
        if self.personality_ttl_secs == 0 || self.search_ttl_secs == 0 {
            errors.push("cache TTLs must be positive".to_string());
        }
        if self.personality_ttl_secs > MAX_TTL_SECS || self.search_ttl_secs > MAX_TTL_SECS {
            errors.push(format!("cache TTLs must not exceed {} seconds", MAX_TTL_SECS));
        }
        errors
    }
}

impl ChatConfig {
    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(0.0..=2.0).contains(&self.temperature) {
            errors.push("Temperature must be between 0 and 2".to_string());
        }
        if self.max_history == 0 || self.max_history % 2 != 0 {
            errors.push("max_history must be a positive even number".to_string());
        }
        errors
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const KEYS: [(&str, &str); 2] = [("TAVILY_API_KEY", "tvly"), ("OPENAI_API_KEY", "sk")];

    #[test]
    fn test_defaults() {
        let config = tokio_test::assert_ok!(AppConfig::from_lookup(env(&KEYS)));
        assert_eq!(config.research.max_search_results, 5);
        assert_eq!(config.research.max_extract_results, 2);
        assert_eq!(config.research.personality_ttl_secs, 86_400);
        assert_eq!(config.research.search_depth, SearchDepth::Basic);
        assert_eq!(config.research.extract_depth, SearchDepth::Advanced);
        assert_eq!(config.chat.model, "gpt-4");
        assert_eq!(config.chat.max_history, 20);
        assert_eq!(config.chat.max_tokens, None);
        assert!(config.chat.enable_personality_research);
        assert!(!config.research.include_images);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_missing_key() {
        let err = tokio_test::assert_err!(AppConfig::from_lookup(env(&[("OPENAI_API_KEY", "sk")])));
        assert!(matches!(err, ConfigError::Missing(ref k) if k == "TAVILY_API_KEY"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = KEYS.to_vec();
        pairs.extend([
            ("TAVILY_MAX_EXTRACT_RESULTS", "3"),
            ("TAVILY_SEARCH_DEPTH", "advanced"),
            ("OPENAI_MAX_TOKENS", "512"),
            ("OPENAI_TEMPERATURE", "0.2"),
            ("SEARCH_CACHE_ENABLE", "TRUE"),
            ("TAVILY_INCLUDE_IMAGES", "true"),
            ("ENABLE_PERSONALITY_RESEARCH", "false"),
        ]);
        let config = AppConfig::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.research.max_extract_results, 3);
        assert_eq!(config.research.search_depth, SearchDepth::Advanced);
        assert!(config.research.cache_search_results);
        assert!(config.research.include_images);
        assert!(!config.chat.enable_personality_research);
        assert_eq!(config.chat.max_tokens, Some(512));
        assert!((config.chat.temperature - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_unparseable_value() {
        let mut pairs = KEYS.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = AppConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let mut pairs = KEYS.to_vec();
        pairs.push(("TAVILY_CACHE_TTL", "10000000000000000"));
        match tokio_test::assert_err!(AppConfig::from_lookup(env(&pairs))) {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("must not exceed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_collects_all_problems() {
        let mut pairs = KEYS.to_vec();
        pairs.extend([
            ("OPENAI_TEMPERATURE", "3.5"),
            ("CHAT_MAX_HISTORY", "7"),
            ("TAVILY_MAX_SEARCH_RESULTS", "0"),
        ]);
        match AppConfig::from_lookup(env(&pairs)).unwrap_err() {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
