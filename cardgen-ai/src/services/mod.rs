//! Pipeline services
//!
//! Stateless text processing (chunker, sanitizer, validator), the two
//! external-service clients, and the stateful orchestrator and delivery queue.

pub mod card_validator;
pub mod chunker;
pub mod delivery_queue;
pub mod generation_client;
pub mod generation_orchestrator;
pub mod prompts;
pub mod sanitizer;
pub mod store_client;

pub use card_validator::{validate_batch, repair_batch, ValidationOutcome};
pub use chunker::{chunk, estimate_tokens};
pub use delivery_queue::{DeliveryOutcome, DeliveryQueue, DeliveryReport, QUEUE_STORAGE_KEY};
pub use generation_client::{
    ChatMessage, ChatRequest, GenerationClient, GenerationService, GenerationServiceError,
};
pub use generation_orchestrator::{GenerationEvent, GenerationOrchestrator, GenerationReport};
pub use store_client::{AnkiConnectClient, CardStore, StoreError};
