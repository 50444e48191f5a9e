//! # persona-chat
//!
//! Researches a named subject's personality through web search, content
//! extraction and a language model, distills it into a system prompt, and
//! serves multi-turn conversations in that persona.
//!
//! The two core pieces:
//!
//! - [`research::PersonalityResearcher`] builds and caches
//!   [`research::PersonalityRecord`]s with bounded freshness and always
//!   produces one, falling back to a minimal record when providers fail.
//! - [`chat::ChatOrchestrator`] keeps per-subject conversation state with a
//!   bounded FIFO history and a fresh system prompt on every turn.
//!
//! External services sit behind the traits in [`providers`]; the
//! [`server`] module exposes everything over HTTP.

pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod prompt;
pub mod providers;
pub mod research;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{ChatOrchestrator, ConversationInfo, InitializationResult};
pub use config::{AppConfig, ChatConfig, ResearchConfig};
pub use error::{ChatError, ConfigError, ProviderError};
pub use research::{PersonalityRecord, PersonalityResearcher, ResearchProviders};
pub use types::{ConversationMessage, Role};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
