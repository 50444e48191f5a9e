//! Personality research: search, extract, distill, synthesize, cache.
//!
//! [`PersonalityResearcher::research`] is the entry point. It always returns
//! a usable [`PersonalityRecord`], falling back to a minimal one when the
//! providers come up empty or fail.

pub mod extraction;
pub mod outcome;
pub mod pipeline;
pub mod record;

pub use extraction::{CandidateQuote, DocumentDistillation};
pub use outcome::StageOutcome;
pub use pipeline::{PersonalityResearcher, ResearchProviders, ResearchReport};
pub use record::{PersonalityRecord, PersonalityTrait, RecordDraft};
