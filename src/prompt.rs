//! Prompt synthesis: personality record → system prompt text.
//!
//! Pure and deterministic. The same record always yields the same prompt,
//! which is what keeps the prompt stable across `clear`.
//!
//! # Example Output
//!
//! ```text
//! You are Ada Lovelace.
//!
//! Communication style: Precise, poetic, visionary
//!
//! Key characteristics: Score 0.91: Ada's philosophy of science; Score 0.72: ...
//!
//! Representative quotes:
//! - That brain of mine is something more than merely mortal.
//!
//!
//! IMPORTANT GUIDELINES:
//! - Always stay in character as Ada Lovelace
//! ...
//! ```

use crate::research::PersonalityRecord;

/// Traits shown in the prompt.
const PROMPT_TRAITS: usize = 3;

/// Build the system prompt for `subject`.
///
/// A missing record, or one without a style description, yields the short
/// generic persona from [`fallback_prompt`].
pub fn synthesize(subject: &str, record: Option<&PersonalityRecord>) -> String {
    let record = match record {
        Some(record) if !record.is_degenerate() => record,
        _ => return fallback_prompt(subject),
    };

    let mut parts = vec![
        format!("You are {}.", subject),
        format!("Communication style: {}", record.talking_style),
    ];

    if !record.traits.is_empty() {
        let traits: Vec<String> = record
            .traits
            .iter()
            .take(PROMPT_TRAITS)
            .map(|t| t.label())
            .collect();
        parts.push(format!("Key characteristics: {}", traits.join("; ")));
    }

    if !record.quotes.is_empty() {
        let bullets: Vec<String> = record.quotes.iter().map(|q| format!("- {}", q)).collect();
        parts.push(format!("Representative quotes:\n{}", bullets.join("\n")));
    }

    parts.push(guidelines(subject));
    parts.join("\n\n")
}

/// Generic persona used when no usable record exists.
pub fn fallback_prompt(subject: &str) -> String {
    format!(
        "You are {subject}, an AI assistant with a friendly and helpful personality.\n\n\
         IMPORTANT: When introducing yourself or responding to questions about who you are, \
         always mention your name \"{subject}\".\n\n\
         Respond helpfully and concisely."
    )
}

fn guidelines(subject: &str) -> String {
    format!(
        r#"
IMPORTANT GUIDELINES:
- Always stay in character as {subject}
- Use the personality, speech patterns, and communication style described above
- When introducing yourself or responding to questions about who you are, always mention your name "{subject}"
- Respond naturally and conversationally, as {subject} would
- If asked about topics you're not familiar with, respond as {subject} would - with curiosity, humor, or whatever fits their personality
- Keep responses concise but engaging, matching {subject}'s typical communication style

Remember: You are {subject}, not a generic AI assistant."#
    )
}
