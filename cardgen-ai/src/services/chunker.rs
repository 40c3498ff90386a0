//! Size-aware text chunker
//!
//! Splits raw text into segments that fit the generation budget. Token counts
//! are a fixed approximation (one token per four characters, rounded up), not
//! a real tokenizer.
//!
//! # Algorithm
//! 1. Text within the limit → one chunk, returned verbatim
//! 2. Otherwise pack blank-line separated paragraphs greedily
//! 3. A paragraph over the limit is split on sentence-ending punctuation and
//!    its sentences are packed the same way
//! 4. A single sentence over the limit is emitted whole (accepted overflow)
//!
//! Pure and deterministic: the same input always yields the same boundaries.

use crate::models::{Chunk, ChunkingOutcome};
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters per estimated token
pub const CHARS_PER_TOKEN: usize = 4;

/// High-water mark above which input is summarized before generation
pub const SUMMARIZATION_THRESHOLD_TOKENS: usize = 10_000;

/// Chunk count beyond which small chunk sizes also trigger summarization
const MAX_CHUNKS_BEFORE_SUMMARY: usize = 5;

/// Lowest threshold small chunk sizes can pull the high-water mark down to
pub const MIN_SUMMARIZATION_THRESHOLD_TOKENS: usize = 2_500;

/// Blank line in either LF or CRLF text
static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n[ \t\r]*\r?\n\s*").unwrap());

/// Estimate tokens as `ceil(chars / 4)`
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Cut text to at most `budget` estimated tokens on a char boundary
pub fn truncate_to_tokens(text: &str, budget: usize) -> String {
    let max_chars = budget.saturating_mul(CHARS_PER_TOKEN);
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Token estimate above which input should be summarized first
///
/// Not a single fixed mark: five chunks' worth of tokens, held between 2,500
/// and 10,000. Chunk sizes of 2,000 tokens and up get exactly 10,000; a 500
/// token chunk size summarizes past 2,500, and nothing smaller goes lower.
pub fn summarization_threshold(max_tokens: usize) -> usize {
    max_tokens
        .saturating_mul(MAX_CHUNKS_BEFORE_SUMMARY)
        .clamp(MIN_SUMMARIZATION_THRESHOLD_TOKENS, SUMMARIZATION_THRESHOLD_TOKENS)
}

/// Split text into chunks of at most `max_tokens` estimated tokens
pub fn chunk(text: &str, max_tokens: usize) -> ChunkingOutcome {
    let max_tokens = max_tokens.max(1);
    let total_tokens = estimate_tokens(text);
    let requires_summarization = total_tokens > summarization_threshold(max_tokens);

    if total_tokens <= max_tokens {
        return ChunkingOutcome {
            chunks: vec![Chunk {
                content: text.to_string(),
                token_count: total_tokens,
                index: 0,
            }],
            total_tokens,
            requires_summarization,
        };
    }

    let mut pieces: Vec<String> = Vec::new();
    let mut packer = Packer::new(max_tokens, "\n\n");

    for paragraph in split_paragraphs(text) {
        if estimate_tokens(paragraph) > max_tokens {
            // Oversized paragraph: close the running chunk, then pack its sentences
            pieces.extend(packer.finish());

            let mut sentence_packer = Packer::new(max_tokens, " ");
            for sentence in split_sentences(paragraph) {
                pieces.extend(sentence_packer.push(sentence));
            }
            pieces.extend(sentence_packer.finish());
        } else {
            pieces.extend(packer.push(paragraph));
        }
    }
    pieces.extend(packer.finish());

    let chunks = pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| Chunk {
            token_count: estimate_tokens(&content),
            content,
            index,
        })
        .collect();

    ChunkingOutcome {
        chunks,
        total_tokens,
        requires_summarization,
    }
}

/// Greedy accumulator: closes the running chunk when the next piece would overflow
struct Packer {
    max_tokens: usize,
    separator: &'static str,
    current: String,
}

impl Packer {
    fn new(max_tokens: usize, separator: &'static str) -> Self {
        Self {
            max_tokens,
            separator,
            current: String::new(),
        }
    }

    /// Add a piece, returning the closed chunk if one was completed
    fn push(&mut self, piece: &str) -> Option<String> {
        if self.current.is_empty() {
            self.current.push_str(piece);
            return None;
        }

        let combined_chars = self.current.chars().count()
            + self.separator.chars().count()
            + piece.chars().count();

        if combined_chars.div_ceil(CHARS_PER_TOKEN) > self.max_tokens {
            let closed = std::mem::replace(&mut self.current, piece.to_string());
            Some(closed)
        } else {
            self.current.push_str(self.separator);
            self.current.push_str(piece);
            None
        }
    }

    fn finish(&mut self) -> Option<String> {
        if self.current.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.current))
        }
    }
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// Split after `.`, `!` or `?` when followed by whitespace
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_i, next_c)) = chars.peek() {
            if next_c.is_whitespace() {
                let sentence = paragraph[start..next_i].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next_i;
            }
        }
    }

    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(words: usize, word: &str) -> String {
        vec![word; words].join(" ")
    }

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_estimate_counts_chars_not_bytes() {
        // 4 multi-byte chars = 1 token
        assert_eq!(estimate_tokens("ééé€"), 1);
    }

    #[test]
    fn test_small_text_is_single_verbatim_chunk() {
        let text = "  First paragraph.\n\nSecond paragraph.  ";
        let outcome = chunk(text, 500);

        assert_eq!(outcome.chunks.len(), 1);
        assert_eq!(outcome.chunks[0].content, text);
        assert_eq!(outcome.chunks[0].index, 0);
        assert_eq!(outcome.total_tokens, estimate_tokens(text));
        assert!(!outcome.requires_summarization);
    }

    #[test]
    fn test_paragraphs_are_packed_without_splitting() {
        // Each paragraph ~72 tokens; limit 100 means one paragraph per chunk
        let p1 = paragraph(48, "alpha");
        let p2 = paragraph(48, "bravo");
        let p3 = paragraph(48, "delta");
        let text = format!("{}\n\n{}\n\n{}", p1, p2, p3);

        let outcome = chunk(&text, 100);

        let contents: Vec<&str> = outcome.chunks.iter().map(|c| c.content.trim()).collect();
        assert_eq!(contents, vec![p1.as_str(), p2.as_str(), p3.as_str()]);
        for (i, c) in outcome.chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(c.token_count <= 100);
        }
    }

    #[test]
    fn test_small_paragraphs_share_a_chunk() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            paragraph(10, "one"),
            paragraph(10, "two"),
            paragraph(200, "three")
        );

        let outcome = chunk(&text, 300);

        assert_eq!(outcome.chunks.len(), 2);
        assert!(outcome.chunks[0].content.contains("one"));
        assert!(outcome.chunks[0].content.contains("two"));
        assert!(!outcome.chunks[0].content.contains("three"));
    }

    #[test]
    fn test_oversized_paragraph_splits_on_sentences() {
        let sentence = format!("{}.", paragraph(20, "word"));
        let long_paragraph = vec![sentence.as_str(); 10].join(" ");
        let text = format!("Intro paragraph.\n\n{}", long_paragraph);

        let outcome = chunk(&text, 80);

        assert!(outcome.chunks.len() > 2);
        assert_eq!(outcome.chunks[0].content, "Intro paragraph.");
        for c in &outcome.chunks {
            assert!(c.token_count <= 80, "chunk over limit: {}", c.token_count);
        }
        // Sentences survive intact
        for c in &outcome.chunks[1..] {
            assert!(c.content.ends_with('.'));
        }
    }

    #[test]
    fn test_unsplittable_sentence_overflows() {
        let giant = paragraph(400, "x");
        let text = format!("Short one.\n\n{}", giant);

        let outcome = chunk(&text, 100);

        assert_eq!(outcome.chunks.len(), 2);
        assert_eq!(outcome.chunks[1].content, giant);
        assert!(outcome.chunks[1].token_count > 100);
    }

    #[test]
    fn test_requires_summarization_threshold() {
        let big = "word ".repeat(3000);
        assert!(chunk(&big, 500).requires_summarization);

        let small = paragraph(10, "word");
        assert!(!chunk(&small, 500).requires_summarization);

        // Default-sized chunks use the fixed high-water mark
        assert_eq!(summarization_threshold(2000), SUMMARIZATION_THRESHOLD_TOKENS);
        assert_eq!(summarization_threshold(8000), SUMMARIZATION_THRESHOLD_TOKENS);
        assert_eq!(summarization_threshold(500), 2500);
        assert_eq!(summarization_threshold(100), MIN_SUMMARIZATION_THRESHOLD_TOKENS);
        assert_eq!(summarization_threshold(0), MIN_SUMMARIZATION_THRESHOLD_TOKENS);

        // A short note at the smallest chunk size is chunked, not summarized
        let note = "a".repeat(2000);
        assert!(!chunk(&note, 100).requires_summarization);

        // Exactly at the threshold is not over it
        let edge = "a".repeat(SUMMARIZATION_THRESHOLD_TOKENS * CHARS_PER_TOKEN);
        assert!(!chunk(&edge, 20_000).requires_summarization);
        let over = "a".repeat(SUMMARIZATION_THRESHOLD_TOKENS * CHARS_PER_TOKEN + 1);
        assert!(chunk(&over, 20_000).requires_summarization);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = (0..40)
            .map(|i| format!("Paragraph {} talks about things. It has two sentences.", i))
            .collect::<Vec<_>>()
            .join("\n\n");

        assert_eq!(chunk(&text, 50), chunk(&text, 50));
    }

    #[test]
    fn test_blank_lines_with_whitespace_separate_paragraphs() {
        let text = format!("{}\n   \n{}", paragraph(30, "left"), paragraph(30, "right"));

        let outcome = chunk(&text, 40);

        assert_eq!(outcome.chunks.len(), 2);
        assert!(outcome.chunks[0].content.starts_with("left"));
        assert!(outcome.chunks[1].content.starts_with("right"));
    }

    #[test]
    fn test_crlf_blank_lines_separate_paragraphs() {
        let paragraphs = [
            paragraph(30, "left"),
            paragraph(30, "mid"),
            paragraph(30, "right"),
        ];
        let text = format!(
            "{}\r\n\r\n{}\r\n \t\r\n{}\r\n",
            paragraphs[0], paragraphs[1], paragraphs[2]
        );

        let outcome = chunk(&text, 40);

        let contents: Vec<&str> = outcome.chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, paragraphs.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(contents.iter().all(|c| !c.contains('\r')));
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("One. Two! Three? Four");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?", "Four"]);

        // Decimal points are not sentence ends
        assert_eq!(split_sentences("Pi is 3.14 roughly."), vec!["Pi is 3.14 roughly."]);
    }

    #[test]
    fn test_truncate_to_tokens() {
        assert_eq!(truncate_to_tokens("abcdefgh", 1), "abcd");
        assert_eq!(truncate_to_tokens("abc", 10), "abc");
        assert_eq!(truncate_to_tokens("ééééé", 1), "éééé");
    }
}
