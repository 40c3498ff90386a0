//! Card store client
//!
//! JSON-RPC style API of the desktop store's sync add-on: every call is a
//! POST of `{action, version: 6, params}` answered by `{result, error}`. A
//! non-null `error` is a call-level failure, distinct from a transport failure.

use crate::models::Card;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("cardgen/", env!("CARGO_PKG_VERSION"));
const API_VERSION: u32 = 6;
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Timeout for the `version` reachability probe
const PROBE_TIMEOUT_SECS: u64 = 3;

/// Store client errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Error string returned by the store itself
    #[error("Store error: {0}")]
    RpcError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl StoreError {
    /// The store rejected the note because an identical one exists
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::RpcError(msg) if msg.to_lowercase().contains("duplicate"))
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    action: &'a str,
    version: u32,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// External structured store receiving approved cards
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Store API version (doubles as the reachability probe)
    async fn version(&self) -> Result<u32, StoreError>;

    async fn deck_names(&self) -> Result<Vec<String>, StoreError>;

    async fn create_deck(&self, deck: &str) -> Result<(), StoreError>;

    /// Add one card as a note; returns the store's note id when it reports one
    async fn add_note(
        &self,
        deck: &str,
        note_type: &str,
        card: &Card,
    ) -> Result<Option<i64>, StoreError>;

    async fn is_reachable(&self) -> bool {
        match self.version().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Store not reachable");
                false
            }
        }
    }
}

/// HTTP client for the store's sync add-on
pub struct AnkiConnectClient {
    http_client: reqwest::Client,
    url: String,
}

impl AnkiConnectClient {
    pub fn new(url: impl Into<String>) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn invoke(
        &self,
        action: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, StoreError> {
        let body = RpcRequest {
            action,
            version: API_VERSION,
            params,
        };

        tracing::debug!(action, "Calling store");

        let mut request = self.http_client.post(&self.url).json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::NetworkError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| StoreError::ParseError(e.to_string()))?;

        match rpc.error {
            Some(error) => Err(StoreError::RpcError(error)),
            None => Ok(rpc.result),
        }
    }
}

#[async_trait]
impl CardStore for AnkiConnectClient {
    async fn version(&self) -> Result<u32, StoreError> {
        let result = self
            .invoke(
                "version",
                json!({}),
                Some(Duration::from_secs(PROBE_TIMEOUT_SECS)),
            )
            .await?;

        result
            .as_u64()
            .map(|v| v as u32)
            .ok_or_else(|| StoreError::ParseError(format!("unexpected version: {}", result)))
    }

    async fn deck_names(&self) -> Result<Vec<String>, StoreError> {
        let result = self.invoke("deckNames", json!({}), None).await?;
        serde_json::from_value(result).map_err(|e| StoreError::ParseError(e.to_string()))
    }

    async fn create_deck(&self, deck: &str) -> Result<(), StoreError> {
        self.invoke("createDeck", json!({ "deck": deck }), None)
            .await?;
        tracing::info!(deck, "Created deck in store");
        Ok(())
    }

    async fn add_note(
        &self,
        deck: &str,
        note_type: &str,
        card: &Card,
    ) -> Result<Option<i64>, StoreError> {
        let params = json!({
            "note": {
                "deckName": deck,
                "modelName": note_type,
                "fields": {
                    "Front": card.front,
                    "Back": card.back,
                },
                "tags": card.tags,
                "options": {
                    "allowDuplicate": false,
                },
            }
        });

        let result = self.invoke("addNote", params, None).await?;
        Ok(result.as_i64())
    }
}
