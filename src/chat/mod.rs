//! Conversations with researched personalities.
//!
//! [`ChatOrchestrator`] owns a [`SubjectRegistry`] of per-subject
//! [`ConversationSession`]s and borrows personalities from the researcher's
//! cache.

pub mod orchestrator;
pub mod registry;
pub mod session;

pub use orchestrator::{
    ChatOrchestrator, ChatTurn, ConversationInfo, DataQuality, InitializationResult,
};
pub use registry::{ChatSubjectState, SubjectRegistry, SubjectState};
pub use session::ConversationSession;
