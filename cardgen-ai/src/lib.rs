//! cardgen-ai library interface
//!
//! Content-to-card pipeline: chunking, concurrency-bounded generation,
//! validation/repair of generator output, and a durable delivery queue for
//! the card store. The `cardgen-ai` binary wires these together; integration
//! tests drive them directly.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::config::{resolve_settings, Settings};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::models::{Card, Chunk, ChunkingOutcome, GenerationMode, QueuedItem};
