//! Generation service client
//!
//! OpenAI-compatible chat completions over authenticated HTTPS POST. The
//! request carries `{model, messages, temperature, max_tokens}`; the answer is
//! read from `choices[0].message.content`. A non-success status or a response
//! without `choices` is a hard call failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("cardgen/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Generation client errors
#[derive(Debug, Error)]
pub enum GenerationServiceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Response contained no choices")]
    MissingChoices,

    #[error("Invalid API key")]
    InvalidApiKey,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completions request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// External text-generation service
///
/// Implementations return the raw text of the first choice.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<String, GenerationServiceError>;
}

/// HTTP client for an OpenAI-compatible chat completions endpoint
pub struct GenerationClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl GenerationClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, GenerationServiceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GenerationServiceError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationService for GenerationClient {
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<String, GenerationServiceError> {
        tracing::debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            "Calling generation service"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationServiceError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GenerationServiceError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationServiceError::ApiError(status.as_u16(), error_text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationServiceError::ParseError(e.to_string()))?;

        let content = body
            .choices
            .and_then(|choices| choices.into_iter().next())
            .ok_or(GenerationServiceError::MissingChoices)?
            .message
            .content
            .unwrap_or_default();

        tracing::debug!(length = content.len(), "Generation call returned");

        Ok(content)
    }
}
