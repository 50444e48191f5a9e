//! Per-document quote and style extraction.
//!
//! The model is asked for a JSON object, but its answer is treated as an
//! untrusted string: anything that does not decode degrades to an empty
//! [`DocumentDistillation`] instead of failing the pipeline.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::research::outcome::StageOutcome;
use crate::types::ConversationMessage;

/// System message for the extraction call.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are an expert at extracting meaningful quotes and analyzing communication styles from text.";

static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("JSON object pattern compiles"));

/// A quote the model attributes to the subject.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateQuote {
    pub quote: String,
    /// What the subject was talking about.
    #[serde(default)]
    pub context: String,
    /// Why the quote is representative.
    #[serde(default, alias = "justification")]
    pub significance: String,
}

/// What one document contributed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentDistillation {
    pub quotes: Vec<CandidateQuote>,
    pub communication_style: Option<String>,
}

/// Take at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Build the user prompt for one document.
pub fn build_extraction_prompt(subject: &str, content: &str, max_chars: usize) -> String {
    let content = truncate_chars(content, max_chars);
    format!(
        r#"Analyze content about {subject}.

CONTENT TO ANALYZE:
{content}

INSTRUCTIONS:
1. Find quotes that {subject} actually said or wrote
2. Prioritize longer, more detailed quotes that provide deeper insights
3. Only include quotes that are insightful, representative of their thinking, or show their personality
4. Exclude generic statements, marketing copy, or quotes from other people
5. Analyze their communication style based on the quotes and content
6. For each quote, provide the exact quote text, a brief context, and why it is representative

FORMAT YOUR RESPONSE AS JSON:
{{
    "communication_style": "A concise description of {subject}'s communication style",
    "quotes": [
        {{
            "quote": "exact quote text",
            "context": "brief context",
            "significance": "why this quote is representative"
        }}
    ]
}}"#
    )
}

/// System + user messages for one document.
pub fn build_extraction_messages(
    subject: &str,
    content: &str,
    max_chars: usize,
) -> Vec<ConversationMessage> {
    vec![
        ConversationMessage::system(EXTRACTION_SYSTEM_PROMPT),
        ConversationMessage::user(build_extraction_prompt(subject, content, max_chars)),
    ]
}

/// Find a JSON object in model output.
///
/// Tries the whole (trimmed) text first, then the outermost `{...}` span.
fn find_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let span = JSON_OBJECT.find(text)?;
    match serde_json::from_str::<Value>(span.as_str()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn quote_from_value(value: &Value) -> Option<CandidateQuote> {
    let quote = match value {
        Value::String(text) => CandidateQuote {
            quote: text.clone(),
            ..Default::default()
        },
        Value::Object(_) => serde_json::from_value(value.clone()).ok()?,
        _ => return None,
    };

    if quote.quote.trim().is_empty() {
        None
    } else {
        Some(quote)
    }
}

/// Decode the extraction model's answer.
pub fn parse_extraction_response(text: &str) -> StageOutcome<DocumentDistillation> {
    let Some(json) = find_json_object(text) else {
        return StageOutcome::degraded(
            DocumentDistillation::default(),
            "No JSON found in extraction response",
        );
    };

    let quotes = json
        .get("quotes")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(quote_from_value).collect())
        .unwrap_or_default();

    let communication_style = json
        .get("communication_style")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    StageOutcome::Ok(DocumentDistillation {
        quotes,
        communication_style,
    })
}
