//! Error types for cardgen-ai
//!
//! Only configuration and input errors reach the caller of the pipeline.
//! Service and validation failures are recovered per chunk or per queued item
//! and surface as counts in the reports.

use thiserror::Error;

/// Pipeline error taxonomy
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or rejected generation credential (fatal, never retried)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Blank or whitespace-only input (fatal, never retried)
    #[error("Input content is empty")]
    EmptyInput,

    /// Generation or store call failed, or the store is unreachable
    #[error("Service unavailable: {0}")]
    TransientService(String),

    /// Generator output could neither be validated nor repaired
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Queued item dropped after its last allowed attempt
    #[error("Delivery retries exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// Queue (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// cardgen-common error
    #[error("Common error: {0}")]
    Common(#[from] cardgen_common::Error),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
