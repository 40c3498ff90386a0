//! Chunk model

use serde::{Deserialize, Serialize};

/// A bounded-size slice of source text submitted as one generation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    /// Estimated tokens (chars / 4, rounded up)
    pub token_count: usize,
    /// Ordinal position within one chunking call
    pub index: usize,
}

/// Result of chunking one input text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingOutcome {
    pub chunks: Vec<Chunk>,
    pub total_tokens: usize,
    /// Input is large enough that it should be summarized before generation
    pub requires_summarization: bool,
}
