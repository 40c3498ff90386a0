//! Data models for the card pipeline
//!
//! - Card: the validated front/back/tags/source record
//! - Chunk / ChunkingOutcome: bounded slices of input text
//! - QueuedItem: a card awaiting delivery to the store

pub mod card;
pub mod chunk;
pub mod queued_item;

pub use card::{Card, GenerationMode, DEFAULT_TAG, MAX_BACK_CHARS, MAX_FRONT_CHARS, MAX_TAGS, MAX_TAG_CHARS};
pub use chunk::{Chunk, ChunkingOutcome};
pub use queued_item::QueuedItem;
