//! Per-subject chat state.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::chat::session::ConversationSession;
use crate::research::PersonalityRecord;

/// Lifecycle of one subject's chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectState {
    #[default]
    Uninitialized,
    Ready,
}

/// Everything the orchestrator keeps for one subject.
#[derive(Debug)]
pub struct ChatSubjectState {
    pub subject: String,
    pub state: SubjectState,
    pub session: ConversationSession,
    /// The record the current prompt was built from.
    pub record: Option<Arc<PersonalityRecord>>,
}

impl ChatSubjectState {
    pub fn new(subject: &str, max_history: usize) -> Self {
        Self {
            subject: subject.to_string(),
            state: SubjectState::Uninitialized,
            session: ConversationSession::new(max_history),
            record: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == SubjectState::Ready
    }

    /// `None` means the subject chats with the generic persona.
    pub fn mark_ready(&mut self, record: Option<Arc<PersonalityRecord>>) {
        self.record = record;
        self.state = SubjectState::Ready;
    }
}

/// Subject name → state, with one async mutex per subject.
///
/// Different subjects never contend; operations on the same subject are
/// serialized by holding that subject's lock.
#[derive(Debug)]
pub struct SubjectRegistry {
    subjects: DashMap<String, Arc<Mutex<ChatSubjectState>>>,
    max_history: usize,
}

impl SubjectRegistry {
    pub fn new(max_history: usize) -> Self {
        Self {
            subjects: DashMap::new(),
            max_history,
        }
    }

    /// The state handle for `subject`, created on first use.
    pub fn handle(&self, subject: &str) -> Arc<Mutex<ChatSubjectState>> {
        let entry = self.subjects.entry(subject.to_string()).or_insert_with(|| {
            log::debug!("Creating chat state for {}", subject);
            Arc::new(Mutex::new(ChatSubjectState::new(subject, self.max_history)))
        });
        Arc::clone(entry.value())
    }

    /// The state handle for `subject`, if it was ever created.
    pub fn get(&self, subject: &str) -> Option<Arc<Mutex<ChatSubjectState>>> {
        self.subjects.get(subject).map(|entry| Arc::clone(entry.value()))
    }

    /// Known subjects, sorted.
    pub fn subjects(&self) -> Vec<String> {
        let mut names: Vec<String> = self.subjects.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Drop every subject's state.
    pub fn reset(&self) {
        self.subjects.clear();
    }
}
