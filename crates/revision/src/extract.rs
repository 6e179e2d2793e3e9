//! Extraction of durable facts from a conversational turn.
//!
//! The extractor model replies with JSON; models wrap JSON in prose or
//! code fences often enough that parsing is strict-first with a
//! brace-span recovery pass before giving up.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Instructions for the extractor model. The reply must be a single JSON
/// object matching [`ExtractedRevision`].
pub const EXTRACTION_PROMPT: &str = "\
You extract durable facts about people and the assistant from one \
conversational turn. Reply with a single JSON object and nothing else:\n\
{\"facts\": [\"short factual statement\", ...],\n \"sensitive\": [\"any fact involving health, finances, contact details, credentials, or location\", ...],\n \"targets\": [{\"entity_id\": \"user:<id>\" or \"bot:self\", \"kind\": \"user\" or \"bot\", \"display_name\": \"...\"}]}\n\
Only include facts worth remembering across conversations. Skip \
pleasantries, questions, and one-off context. If nothing is worth \
keeping, reply {\"facts\": []}.";

/// One entity a revision applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedTarget {
    pub entity_id: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub display_name: String,
}

fn default_kind() -> String {
    "user".to_string()
}

/// The extractor model's structured reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedRevision {
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub sensitive: Vec<String>,
    #[serde(default)]
    pub targets: Vec<ExtractedTarget>,
}

fn string_items(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn from_object(value: Value) -> Option<ExtractedRevision> {
    let obj = value.as_object()?;
    // Malformed individual targets are dropped, not fatal.
    let targets = obj
        .get("targets")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|t| serde_json::from_value::<ExtractedTarget>(t.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    Some(ExtractedRevision {
        facts: string_items(obj.get("facts")),
        sensitive: string_items(obj.get("sensitive")),
        targets,
    })
}

/// Parse the extractor reply. Strict JSON first; failing that, the widest
/// `{`..`}` span is tried; failing that, `None`.
pub fn parse_extraction(text: &str) -> Option<ExtractedRevision> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(text)
        && value.is_object()
    {
        return from_object(value);
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
        && let Ok(value) = serde_json::from_str::<Value>(&text[start..=end])
        && value.is_object()
    {
        return from_object(value);
    }

    warn!(raw = text.chars().take(200).collect::<String>(), "Failed to parse extraction reply");
    None
}

/// Trim, drop empties, and dedupe preserving first occurrence.
pub fn clean_facts<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut facts = Vec::new();
    for item in items {
        let item = item.as_ref().trim();
        if item.is_empty() || !seen.insert(item.to_string()) {
            continue;
        }
        facts.push(item.to_string());
    }
    facts
}
