//! Prompt construction for generation and summarization calls

use crate::models::GenerationMode;

/// Fewest cards requested per chunk
pub const MIN_CARDS_PER_CHUNK: usize = 3;
/// Most cards requested per chunk
pub const MAX_CARDS_PER_CHUNK: usize = 10;

pub const CARD_SYSTEM_PROMPT: &str = "You are an expert at writing spaced-repetition flashcards. \
Each card tests exactly one fact or concept. Fronts are concise questions; backs are complete \
but short answers. Respond with JSON only: an array of objects with string fields \"front\" and \
\"back\" and an array field \"tags\". Do not wrap the JSON in prose.";

pub const SUMMARY_SYSTEM_PROMPT: &str = "You condense study material. Keep every definition, \
fact, name, date and relationship a learner would need; drop repetition and filler. Respond \
with the condensed text only.";

/// User prompt asking for cards from one chunk
pub fn card_prompt(content: &str, mode: GenerationMode, tags: &[String]) -> String {
    let tag_instruction = match mode {
        GenerationMode::Dynamic => {
            "Infer 1 to 3 short lowercase topic tags for each card from its content.".to_string()
        }
        GenerationMode::Fixed if tags.is_empty() => {
            "Leave \"tags\" as an empty array on every card.".to_string()
        }
        GenerationMode::Fixed => format!(
            "Use exactly these tags on every card: {}.",
            tags.join(", ")
        ),
    };

    format!(
        "Create between {} and {} flashcards from the material below. Cover the most \
important ideas first and never invent facts that are not in the material.\n{}\n\n\
Material:\n\"\"\"\n{}\n\"\"\"",
        MIN_CARDS_PER_CHUNK, MAX_CARDS_PER_CHUNK, tag_instruction, content
    )
}

/// User prompt asking to compress content to roughly `target_tokens`
pub fn summary_prompt(content: &str, target_tokens: usize) -> String {
    format!(
        "Condense the following material to at most about {} words while keeping all key \
information.\n\n\"\"\"\n{}\n\"\"\"",
        // Roughly three words per four tokens
        target_tokens * 3 / 4,
        content
    )
}
