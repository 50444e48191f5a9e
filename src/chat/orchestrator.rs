//! Per-subject conversation orchestration.
//!
//! The flow per message:
//! 1. Make sure the subject has a fresh personality record (cache or research)
//! 2. Synthesize the system prompt from that record
//! 3. Call the completion provider with prompt + history + message
//! 4. On success, append the exchange and apply the history bound

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chat::registry::{ChatSubjectState, SubjectRegistry};
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::prompt;
use crate::providers::CompletionProvider;
use crate::research::{PersonalityRecord, PersonalityResearcher};

// ============================================================================
// Result types
// ============================================================================

/// How much research backs a personality.
///
/// The default (all false, zero pieces) describes a subject with no record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataQuality {
    /// The record came from real research and carries quotes.
    pub has_sufficient_data: bool,
    /// Document content was fetched for this record.
    pub has_recent_data: bool,
    /// Number of documents the record was distilled from.
    pub total_pieces: usize,
}

impl DataQuality {
    pub fn of(record: &PersonalityRecord) -> Self {
        Self {
            has_sufficient_data: !record.degraded && !record.quotes.is_empty(),
            has_recent_data: !record.extracted_content.is_empty(),
            total_pieces: record.extracted_content.len(),
        }
    }
}

/// Outcome of `initialize` / `reinitialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializationResult {
    pub subject: String,
    /// The system prompt the subject will chat with.
    pub personality_context: String,
    pub confidence: f64,
    /// Reasons for any degraded research stage.
    pub diagnostics: Vec<String>,
    pub data_quality: DataQuality,
    pub from_cache: bool,
}

/// One completed turn, with the history size read under the same lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub response: String,
    pub exchange_count: usize,
    pub estimated_tokens: usize,
}

/// Snapshot of a subject's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub subject: String,
    /// Completed user/assistant exchanges in history.
    pub exchange_count: usize,
    pub estimated_tokens: usize,
    pub current_prompt: String,
    pub session_id: Option<String>,
    pub initialized: bool,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Chat front end over the researcher and a completion provider.
///
/// Shares the researcher's personality cache; it keeps no cache of its own.
#[derive(Debug)]
pub struct ChatOrchestrator {
    researcher: Arc<PersonalityResearcher>,
    completion: Arc<dyn CompletionProvider>,
    registry: SubjectRegistry,
    config: ChatConfig,
}

impl ChatOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Arguments
    ///
    /// * `researcher` - Source of personality records.
    /// * `completion` - Conversational model.
    /// * `config` - Chat settings; `max_history` bounds every session.
    pub fn new(
        researcher: Arc<PersonalityResearcher>,
        completion: Arc<dyn CompletionProvider>,
        config: ChatConfig,
    ) -> Self {
        log::info!(
            "Chat orchestrator ready: model={}, max_history={}",
            completion.model(),
            config.max_history
        );
        Self {
            researcher,
            completion,
            registry: SubjectRegistry::new(config.max_history),
            config,
        }
    }

    pub fn researcher(&self) -> &Arc<PersonalityResearcher> {
        &self.researcher
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Obtain a personality for `subject` and mark it ready.
    ///
    /// Idempotent: a second call while the cached record is fresh performs
    /// no research.
    pub async fn initialize(&self, subject: &str) -> InitializationResult {
        let handle = self.registry.handle(subject);
        let mut state = handle.lock().await;

        let (record, from_cache) = self.ensure_record(&mut state).await;
        let result = initialization_result(subject, record.as_deref(), from_cache);
        log::info!(
            "Initialized {} (confidence {:.2}, from_cache={})",
            subject,
            result.confidence,
            from_cache
        );
        result
    }

    /// Forget the cached personality, research again, keep the history.
    pub async fn reinitialize(&self, subject: &str) -> InitializationResult {
        let handle = self.registry.handle(subject);
        let mut state = handle.lock().await;

        if !self.config.enable_personality_research {
            state.mark_ready(None);
            return initialization_result(subject, None, false);
        }

        self.researcher.invalidate(subject);
        let report = self.researcher.research_report(subject).await;
        state.mark_ready(Some(Arc::clone(&report.record)));

        log::info!("Reinitialized {}", subject);
        initialization_result(subject, Some(&report.record), report.from_cache)
    }

    /// Send `message` as the subject's conversation partner.
    ///
    /// On failure the history is left exactly as it was.
    pub async fn chat(&self, subject: &str, message: &str) -> Result<String, ChatError> {
        self.chat_turn(subject, message).await.map(|turn| turn.response)
    }

    /// Like [`chat`](Self::chat), also reporting the history size right
    /// after this exchange.
    pub async fn chat_turn(&self, subject: &str, message: &str) -> Result<ChatTurn, ChatError> {
        let handle = self.registry.handle(subject);
        let mut state = handle.lock().await;

        if !state.is_ready() {
            log::info!("Auto-initializing {}", subject);
        }
        let (record, _) = self.ensure_record(&mut state).await;

        let system_prompt = prompt::synthesize(subject, record.as_deref());
        let messages = state.session.build_messages(&system_prompt, message);

        let reply = self
            .completion
            .complete(&messages)
            .await
            .map_err(|source| {
                log::error!("Chat completion failed for {}: {}", subject, source);
                ChatError::Completion {
                    subject: subject.to_string(),
                    source,
                }
            })?;

        state.session.record_exchange(message, reply.clone());
        let exchange_count = state.session.exchange_count();
        log::info!(
            "Response generated for {} ({} exchanges)",
            subject,
            exchange_count
        );
        Ok(ChatTurn {
            response: reply,
            exchange_count,
            estimated_tokens: state.session.estimated_tokens(),
        })
    }

    /// Conversation snapshot. Never fails and never performs I/O.
    pub async fn get_info(&self, subject: &str) -> ConversationInfo {
        let Some(handle) = self.registry.get(subject) else {
            return ConversationInfo {
                subject: subject.to_string(),
                exchange_count: 0,
                estimated_tokens: 0,
                current_prompt: prompt::synthesize(subject, None),
                session_id: None,
                initialized: false,
            };
        };

        let state = handle.lock().await;
        ConversationInfo {
            subject: subject.to_string(),
            exchange_count: state.session.exchange_count(),
            estimated_tokens: state.session.estimated_tokens(),
            current_prompt: prompt::synthesize(subject, state.record.as_deref()),
            session_id: Some(state.session.session_id().to_string()),
            initialized: state.is_ready(),
        }
    }

    /// Empty the history and start a new session; the personality is kept.
    pub async fn clear(&self, subject: &str) {
        let handle = self.registry.handle(subject);
        let mut state = handle.lock().await;
        state.session.clear();
    }

    /// Subjects with chat state, sorted.
    pub fn subjects(&self) -> Vec<String> {
        self.registry.subjects()
    }

    /// Drop all chat state. Cached personalities are kept.
    pub fn reset(&self) {
        self.registry.reset();
    }

    /// A fresh record for the locked subject, researching if the cached one
    /// is missing or expired. `None` when research is switched off.
    async fn ensure_record(
        &self,
        state: &mut ChatSubjectState,
    ) -> (Option<Arc<PersonalityRecord>>, bool) {
        if !self.config.enable_personality_research {
            state.mark_ready(None);
            return (None, false);
        }

        if let Some(record) = self.researcher.cached(&state.subject) {
            state.mark_ready(Some(Arc::clone(&record)));
            return (Some(record), true);
        }

        if state.is_ready() {
            log::info!("Personality for {} expired, researching again", state.subject);
        }
        let report = self.researcher.research_report(&state.subject).await;
        state.mark_ready(Some(Arc::clone(&report.record)));
        (Some(report.record), report.from_cache)
    }
}

fn initialization_result(
    subject: &str,
    record: Option<&PersonalityRecord>,
    from_cache: bool,
) -> InitializationResult {
    InitializationResult {
        subject: subject.to_string(),
        personality_context: prompt::synthesize(subject, record),
        confidence: record.map_or(0.0, |r| r.confidence),
        diagnostics: record.map(|r| r.diagnostics.clone()).unwrap_or_default(),
        data_quality: record.map(DataQuality::of).unwrap_or_default(),
        from_cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::config::ResearchConfig;
    use crate::research::pipeline::primary_query;
    use crate::research::ResearchProviders;
    use crate::testing::{
        extraction_json, hit, FailingCompletion, FailingExtractor, FailingSearch, MockCompletion,
        MockExtractor, MockSearch,
    };
    use crate::types::Role;

    struct Harness {
        search: Arc<MockSearch>,
        chat_model: Arc<MockCompletion>,
        clock: ManualClock,
        orchestrator: ChatOrchestrator,
    }

    fn harness() -> Harness {
        let search = Arc::new(MockSearch::new().with_results(
            &primary_query("Ada"),
            vec![hit("Ada's philosophy", "https://a.example", 0.8)],
        ));
        let extractor = Arc::new(MockExtractor::new().with_content("https://a.example", "doc A"));
        let extraction_model = Arc::new(
            MockCompletion::new().reply_when("doc A", extraction_json("Precise", &["Imagine."])),
        );
        let chat_model = Arc::new(MockCompletion::new().with_default_reply("Hello, I am Ada."));
        let clock = ManualClock::default();

        let researcher = Arc::new(PersonalityResearcher::with_clock(
            ResearchConfig::default(),
            ResearchProviders {
                search: search.clone(),
                extractor,
                completion: extraction_model,
            },
            Arc::new(clock.clone()),
        ));
        let orchestrator = ChatOrchestrator::new(researcher, chat_model.clone(), ChatConfig::default());

        Harness {
            search,
            chat_model,
            clock,
            orchestrator,
        }
    }

    fn failing_orchestrator() -> ChatOrchestrator {
        let researcher = Arc::new(PersonalityResearcher::new(
            ResearchConfig::default(),
            ResearchProviders {
                search: Arc::new(FailingSearch),
                extractor: Arc::new(FailingExtractor),
                completion: Arc::new(FailingCompletion),
            },
        ));
        ChatOrchestrator::new(researcher, Arc::new(FailingCompletion), ChatConfig::default())
    }

    #[tokio::test]
    async fn test_double_initialize_researches_once() {
        let h = harness();

        let first = h.orchestrator.initialize("Ada").await;
        let second = h.orchestrator.initialize("Ada").await;

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.personality_context, second.personality_context);
        assert_eq!(h.search.calls(), 1);
        assert!(first.data_quality.has_sufficient_data);
        assert_eq!(first.data_quality.total_pieces, 1);
        assert!(first.personality_context.contains("- Imagine."));
    }

    #[tokio::test]
    async fn test_chat_auto_initializes_and_records_exchange() {
        let h = harness();

        let reply = h.orchestrator.chat("Ada", "Who are you?").await.unwrap();
        assert_eq!(reply, "Hello, I am Ada.");

        let info = h.orchestrator.get_info("Ada").await;
        assert!(info.initialized);
        assert_eq!(info.exchange_count, 1);
        assert!(info.estimated_tokens > 0);

        let sent = &h.chat_model.received()[0];
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.starts_with("You are Ada."));
        assert_eq!(sent.last().unwrap().content, "Who are you?");
    }

    #[tokio::test]
    async fn test_system_prompt_sent_fresh_but_not_stored() {
        let h = harness();
        h.orchestrator.chat("Ada", "one").await.unwrap();
        h.orchestrator.chat("Ada", "two").await.unwrap();

        let second_call = &h.chat_model.received()[1];
        let system_messages = second_call.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(system_messages, 1);
        assert_eq!(second_call.len(), 4);
    }

    #[tokio::test]
    async fn test_history_bounded_after_eleven_turns() {
        let h = harness();
        for i in 1..=11 {
            h.orchestrator.chat("Ada", &format!("turn {}", i)).await.unwrap();
        }

        assert_eq!(h.orchestrator.get_info("Ada").await.exchange_count, 10);

        h.orchestrator.chat("Ada", "turn 12").await.unwrap();
        let last_call = h.chat_model.received().pop().unwrap();
        let contents: Vec<&str> = last_call.iter().map(|m| m.content.as_str()).collect();
        assert!(!contents.contains(&"turn 1"));
        assert!(contents.contains(&"turn 2"));
        assert!(contents.contains(&"turn 11"));
        // system + 20 history + new message
        assert_eq!(last_call.len(), 22);
    }

    #[tokio::test]
    async fn test_clear_keeps_prompt_and_resets_history() {
        let h = harness();
        h.orchestrator.chat("Ada", "hi").await.unwrap();
        let before = h.orchestrator.get_info("Ada").await;

        h.orchestrator.clear("Ada").await;
        let after = h.orchestrator.get_info("Ada").await;

        assert_eq!(after.exchange_count, 0);
        assert_eq!(after.current_prompt, before.current_prompt);
        assert_ne!(after.session_id, before.session_id);
        assert!(after.initialized);

        // The next turn is sent with the same system prompt and no old history.
        h.orchestrator.chat("Ada", "hi again").await.unwrap();
        let received = h.chat_model.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0][0].role, Role::System);
        assert_eq!(received[1][0].content, received[0][0].content);
        assert_eq!(received[1].len(), 2);
        assert_eq!(received[1][1].content, "hi again");
        assert_eq!(h.search.calls(), 1);
    }

    #[tokio::test]
    async fn test_chat_turn_reports_history_size() {
        let h = harness();
        let first = h.orchestrator.chat_turn("Ada", "one").await.unwrap();
        assert_eq!(first.response, "Hello, I am Ada.");
        assert_eq!(first.exchange_count, 1);

        let second = h.orchestrator.chat_turn("Ada", "two").await.unwrap();
        assert_eq!(second.exchange_count, 2);
        assert!(second.estimated_tokens > first.estimated_tokens);

        let info = h.orchestrator.get_info("Ada").await;
        assert_eq!(info.exchange_count, second.exchange_count);
        assert_eq!(info.estimated_tokens, second.estimated_tokens);
    }

    #[tokio::test]
    async fn test_research_disabled_uses_fallback_persona() {
        let h = harness();
        let orchestrator = ChatOrchestrator::new(
            Arc::clone(h.orchestrator.researcher()),
            h.chat_model.clone(),
            ChatConfig {
                enable_personality_research: false,
                ..ChatConfig::default()
            },
        );

        let result = orchestrator.initialize("Ada").await;
        assert_eq!(result.personality_context, prompt::fallback_prompt("Ada"));
        assert_eq!(result.confidence, 0.0);
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.data_quality, DataQuality::default());
        assert!(!result.from_cache);

        orchestrator.chat("Ada", "hi").await.unwrap();
        orchestrator.reinitialize("Ada").await;
        orchestrator.chat("Ada", "hi again").await.unwrap();

        assert_eq!(h.search.calls(), 0);
        assert_eq!(orchestrator.researcher().cache_info().total_entries, 0);
        for messages in h.chat_model.received() {
            assert_eq!(messages[0].content, prompt::fallback_prompt("Ada"));
        }
        let info = orchestrator.get_info("Ada").await;
        assert!(info.initialized);
        assert_eq!(info.current_prompt, prompt::fallback_prompt("Ada"));
    }

    #[tokio::test]
    async fn test_chat_failure_leaves_history_untouched() {
        let h = harness();
        h.orchestrator.chat("Ada", "hi").await.unwrap();

        h.chat_model.set_failing(true);
        let err = h.orchestrator.chat("Ada", "again").await.unwrap_err();

        assert!(matches!(err, ChatError::Completion { ref subject, .. } if subject == "Ada"));
        assert!(err.to_string().starts_with("Failed to generate response for Ada"));
        assert_eq!(h.orchestrator.get_info("Ada").await.exchange_count, 1);
    }

    #[tokio::test]
    async fn test_get_info_unknown_subject_with_failing_providers() {
        let orchestrator = failing_orchestrator();

        let info = orchestrator.get_info("Nobody").await;

        assert_eq!(info.exchange_count, 0);
        assert_eq!(info.estimated_tokens, 0);
        assert!(!info.initialized);
        assert!(info.session_id.is_none());
        assert!(info.current_prompt.contains("Nobody"));
        assert!(orchestrator.subjects().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_with_failing_providers_degrades() {
        let orchestrator = failing_orchestrator();

        let result = orchestrator.initialize("Nobody").await;

        assert_eq!(result.confidence, 0.0);
        assert!(!result.diagnostics.is_empty());
        assert!(!result.data_quality.has_sufficient_data);
        assert!(result.personality_context.contains("You are Nobody."));
    }

    #[tokio::test]
    async fn test_expired_personality_is_researched_again_on_chat() {
        let h = harness();
        h.orchestrator.initialize("Ada").await;

        h.clock.advance(ResearchConfig::default().personality_ttl_secs as i64 + 1);
        h.orchestrator.chat("Ada", "still there?").await.unwrap();

        assert_eq!(h.search.calls(), 2);
    }

    #[tokio::test]
    async fn test_reinitialize_researches_and_keeps_history() {
        let h = harness();
        h.orchestrator.chat("Ada", "hi").await.unwrap();

        let result = h.orchestrator.reinitialize("Ada").await;

        assert!(!result.from_cache);
        assert_eq!(h.search.calls(), 2);
        assert_eq!(h.orchestrator.get_info("Ada").await.exchange_count, 1);
    }

    #[tokio::test]
    async fn test_reset_drops_chat_state_only() {
        let h = harness();
        h.orchestrator.chat("Ada", "hi").await.unwrap();
        assert_eq!(h.orchestrator.subjects(), vec!["Ada"]);

        h.orchestrator.reset();

        assert!(h.orchestrator.subjects().is_empty());
        assert!(h.orchestrator.researcher().cached("Ada").is_some());
    }
}
