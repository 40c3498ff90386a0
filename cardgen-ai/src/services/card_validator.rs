//! Card validation and repair engine
//!
//! Checks raw generator output against the card schema and, when that fails,
//! rebuilds whatever cards can be salvaged.
//!
//! # Validation
//! A candidate is valid when it is an object whose `front` and `back` are
//! non-empty strings within the length ceilings and whose `tags` is an array
//! of strings. A batch is valid only when it is non-empty and every candidate
//! passes.
//!
//! # Repair
//! Best effort, never fails. Alternate field names are accepted
//! (`question`/`prompt`, `answer`/`response`), text is sanitized, overlong
//! text is truncated with an ellipsis, tags are normalized with a default
//! fallback. Candidates still missing a front or back are skipped.
//!
//! # Response shapes
//! A JSON array, a string holding a JSON array (optionally wrapped in prose or
//! a code fence), or an object with a `flashcards` / `cards` array are all
//! unwrapped into one candidate list by [`normalize_response`].

use crate::models::{Card, DEFAULT_TAG, MAX_BACK_CHARS, MAX_FRONT_CHARS, MAX_TAGS, MAX_TAG_CHARS};
use crate::services::sanitizer;
use serde_json::Value;
use tracing::debug;

const FRONT_FIELDS: [&str; 3] = ["front", "question", "prompt"];
const BACK_FIELDS: [&str; 3] = ["back", "answer", "response"];
const WRAPPER_FIELDS: [&str; 2] = ["flashcards", "cards"];
const ELLIPSIS: &str = "...";

/// Result of validating one batch of candidates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub valid: bool,
    /// One message per malformed candidate, numbered from 1 within the batch
    pub errors: Vec<String>,
    /// Normalized cards when the batch is valid
    pub cards: Vec<Card>,
    /// Salvaged cards, set only when repair ran and produced at least one
    pub repaired: Option<Vec<Card>>,
}

impl ValidationOutcome {
    /// Usable cards: the validated batch, else whatever repair recovered
    pub fn into_cards(self) -> Option<Vec<Card>> {
        if self.valid {
            Some(self.cards)
        } else {
            self.repaired
        }
    }
}

/// Validate a batch, repairing it when any candidate is malformed
///
/// Validity is all-or-nothing; an invalid batch still yields every candidate
/// repair can recover, good ones included.
pub fn validate_batch(candidates: &[Value]) -> ValidationOutcome {
    if candidates.is_empty() {
        return ValidationOutcome {
            valid: false,
            errors: vec!["Batch contains no cards".to_string()],
            cards: Vec::new(),
            repaired: None,
        };
    }

    let errors: Vec<String> = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, candidate)| {
            validate_candidate(candidate)
                .err()
                .map(|e| format!("Card {}: {}", i + 1, e))
        })
        .collect();

    if errors.is_empty() {
        return ValidationOutcome {
            valid: true,
            errors,
            cards: repair_batch(candidates),
            repaired: None,
        };
    }

    debug!(
        invalid = errors.len(),
        total = candidates.len(),
        "Batch failed validation, attempting repair"
    );

    let repaired = repair_batch(candidates);
    ValidationOutcome {
        valid: false,
        errors,
        cards: Vec::new(),
        repaired: if repaired.is_empty() { None } else { Some(repaired) },
    }
}

/// Check one candidate against the schema
pub fn validate_candidate(candidate: &Value) -> Result<(), String> {
    let object = candidate
        .as_object()
        .ok_or_else(|| "not an object".to_string())?;

    check_text_field(object.get("front"), "front", MAX_FRONT_CHARS)?;
    check_text_field(object.get("back"), "back", MAX_BACK_CHARS)?;

    match object.get("tags") {
        Some(Value::Array(tags)) if tags.iter().all(Value::is_string) => Ok(()),
        Some(Value::Array(_)) => Err("'tags' contains non-string entries".to_string()),
        Some(_) => Err("'tags' is not an array".to_string()),
        None => Err("missing 'tags'".to_string()),
    }
}

fn check_text_field(value: Option<&Value>, name: &str, max_chars: usize) -> Result<(), String> {
    match value {
        Some(Value::String(text)) if text.trim().is_empty() => {
            Err(format!("missing or empty '{}'", name))
        }
        Some(Value::String(text)) => {
            let length = text.chars().count();
            if length > max_chars {
                Err(format!("'{}' too long ({} > {} chars)", name, length, max_chars))
            } else {
                Ok(())
            }
        }
        Some(_) => Err(format!("'{}' is not a string", name)),
        None => Err(format!("missing or empty '{}'", name)),
    }
}

/// Rebuild every salvageable card; unrepairable candidates are skipped
pub fn repair_batch(candidates: &[Value]) -> Vec<Card> {
    candidates.iter().filter_map(repair_candidate).collect()
}

/// Best-effort reconstruction of a single card
pub fn repair_candidate(candidate: &Value) -> Option<Card> {
    let object = candidate.as_object()?;

    let front = first_text(object, &FRONT_FIELDS)?;
    let back = first_text(object, &BACK_FIELDS)?;

    let front = truncate_with_ellipsis(&front, MAX_FRONT_CHARS);
    let back = truncate_with_ellipsis(&back, MAX_BACK_CHARS);

    let raw_tags: Vec<String> = match object.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(joined)) => joined
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Some(Card::new(front, back, tags_or_default(&raw_tags)))
}

/// First field (in priority order) whose cleaned text is non-empty
fn first_text(object: &serde_json::Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        let text = match object.get(*field)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let cleaned = sanitizer::clean_card_text(&text);
        (!cleaned.is_empty()).then_some(cleaned)
    })
}

/// Cut to `max_chars - 3` chars plus an ellipsis marker when over the limit
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Lowercase, trim, drop empty/overlong, dedupe (first seen wins), cap at 10
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_CHARS {
            continue;
        }
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
        if normalized.len() == MAX_TAGS {
            break;
        }
    }
    normalized
}

/// [`normalize_tags`], falling back to the single default tag when empty
pub fn tags_or_default<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let normalized = normalize_tags(tags);
    if normalized.is_empty() {
        vec![DEFAULT_TAG.to_string()]
    } else {
        normalized
    }
}

/// Unwrap any accepted response shape into a flat candidate list
pub fn normalize_response(raw: &Value) -> Vec<Value> {
    match raw {
        Value::Array(items) => items.clone(),
        Value::String(text) => parse_candidates(text),
        Value::Object(map) => {
            for field in WRAPPER_FIELDS {
                if let Some(Value::Array(items)) = map.get(field) {
                    return items.clone();
                }
            }
            // A lone card object
            if FRONT_FIELDS.iter().any(|f| map.contains_key(*f)) {
                return vec![raw.clone()];
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Parse candidates out of generator text
///
/// Tries the whole (fence-stripped) text as JSON first, then the outermost
/// `[...]` span, then the outermost `{...}` span.
pub fn parse_candidates(text: &str) -> Vec<Value> {
    let text = sanitizer::unwrap_code_fence(text);

    if let Ok(value) = serde_json::from_str::<Value>(&text) {
        return normalize_response(&value);
    }

    for (open, close) in [('[', ']'), ('{', '}')] {
        if let Some(span) = extract_span(&text, open, close) {
            if let Ok(value) = serde_json::from_str::<Value>(span) {
                let candidates = normalize_response(&value);
                if !candidates.is_empty() {
                    return candidates;
                }
            }
        }
    }

    debug!(length = text.len(), "No card array found in generator output");
    Vec::new()
}

fn extract_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
