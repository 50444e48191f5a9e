//! Error types for persona-chat.
//!
//! Provider failures are always caught by the stage that issued the call.
//! Only [`ChatError`] is allowed to reach callers of the orchestrator.

use thiserror::Error;

/// Errors raised by the external search, extraction and completion providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connection refused, TLS, body read).
    #[error("{provider} request failed: {message}")]
    Http { provider: String, message: String },

    /// The provider answered with a non-success status code.
    #[error("{provider} API error ({status}): {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("{provider} request timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    /// The provider answered but the payload could not be understood.
    #[error("Malformed {provider} response: {message}")]
    Malformed { provider: String, message: String },

    /// No API key was configured for the provider.
    #[error("{provider} API key not set")]
    MissingApiKey { provider: String },

    /// Generic unavailability, mostly produced by test doubles.
    #[error("{provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },
}

impl ProviderError {
    /// Map a `reqwest` error onto the provider taxonomy.
    pub fn from_reqwest(provider: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
                seconds: timeout_secs,
            }
        } else if err.is_decode() {
            Self::Malformed {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Http {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Whether a retry could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors surfaced by [`ChatOrchestrator::chat`](crate::chat::ChatOrchestrator::chat).
#[derive(Debug, Error)]
pub enum ChatError {
    /// The completion provider failed; history was left untouched.
    #[error("Failed to generate response for {subject}: {source}")]
    Completion {
        subject: String,
        #[source]
        source: ProviderError,
    },
}

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} environment variable is required")]
    Missing(String),

    /// A value was present but unusable.
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    /// One or more cross-field checks failed.
    #[error("Configuration validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryable() {
        let rate_limited = ProviderError::Status {
            provider: "openai".into(),
            status: 429,
            body: String::new(),
        };
        let bad_request = ProviderError::Status {
            provider: "openai".into(),
            status: 400,
            body: "bad".into(),
        };
        assert!(rate_limited.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!ProviderError::MissingApiKey {
            provider: "tavily".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_chat_error_message_names_cause() {
        let err = ChatError::Completion {
            subject: "Ada".into(),
            source: ProviderError::Timeout {
                provider: "openai".into(),
                seconds: 30,
            },
        };
        let text = err.to_string();
        assert!(text.contains("Ada"));
        assert!(text.contains("timed out after 30s"));
    }

    #[test]
    fn test_validation_error_joins_reasons() {
        let err = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Configuration validation failed: a; b");
    }
}
