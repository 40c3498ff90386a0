//! Card model

use serde::{Deserialize, Serialize};

/// Maximum characters on the front of a card
pub const MAX_FRONT_CHARS: usize = 5000;

/// Maximum characters on the back of a card
pub const MAX_BACK_CHARS: usize = 10000;

/// Maximum number of tags per card
pub const MAX_TAGS: usize = 10;

/// Maximum characters per tag
pub const MAX_TAG_CHARS: usize = 50;

/// Tag applied when normalization leaves a card with none
pub const DEFAULT_TAG: &str = "generated";

/// A validated card
///
/// Cards leaving the validator always have a non-empty front and back and
/// 1..=10 normalized tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub front: String,
    pub back: String,
    pub tags: Vec<String>,
    /// Provenance label, e.g. the originating document name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Card {
    pub fn new(front: impl Into<String>, back: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
            tags,
            source: None,
        }
    }

    /// Attach provenance metadata
    pub fn with_source(mut self, source: Option<&str>) -> Self {
        self.source = source.map(str::to_string);
        self
    }
}

/// How tags are chosen for generated cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// The generator infers tags from the content; caller tags are appended
    #[default]
    Dynamic,
    /// Every card carries exactly the caller-supplied tags
    Fixed,
}
