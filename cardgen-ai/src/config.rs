//! Runtime settings resolution for cardgen-ai
//!
//! Provides multi-tier configuration resolution with ENV → TOML → built-in
//! default priority. The resolved [`Settings`] value is handed to each
//! component at construction and replaced through their `reconfigure` call;
//! nothing reads configuration from global state.

use cardgen_common::config::TomlConfig;
use std::time::Duration;
use tracing::{info, warn};

/// Default OpenAI-compatible chat completions endpoint
pub const DEFAULT_GENERATION_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default local store endpoint (desktop sync add-on)
pub const DEFAULT_STORE_URL: &str = "http://127.0.0.1:8765";
pub const DEFAULT_DECK: &str = "Default";
pub const DEFAULT_NOTE_TYPE: &str = "Basic";
pub const DEFAULT_MAX_CHUNK_TOKENS: usize = 2000;
pub const DEFAULT_MAX_PARALLEL_REQUESTS: usize = 3;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Smallest chunk size accepted; anything lower would turn every sentence into a call
const MIN_CHUNK_TOKENS: usize = 100;

pub const API_KEY_ENV: &str = "CARDGEN_API_KEY";
pub const MODEL_ENV: &str = "CARDGEN_MODEL";
pub const STORE_URL_ENV: &str = "CARDGEN_STORE_URL";
pub const DECK_ENV: &str = "CARDGEN_DECK";

/// Resolved runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Generation service credential
    pub api_key: Option<String>,
    pub model: String,
    pub generation_endpoint: String,
    pub store_url: String,
    /// Target deck (collection) in the store
    pub deck_name: String,
    pub note_type: String,
    pub max_chunk_tokens: usize,
    /// Hard ceiling on simultaneous generation calls
    pub max_parallel_requests: usize,
    /// Pacing delay between generation batches
    pub batch_delay: Duration,
    pub offline_queue_enabled: bool,
    pub max_retries: u32,
    pub default_tags: Vec<String>,
    pub auto_sync_on_approval: bool,
    pub sync_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            generation_endpoint: DEFAULT_GENERATION_ENDPOINT.to_string(),
            store_url: DEFAULT_STORE_URL.to_string(),
            deck_name: DEFAULT_DECK.to_string(),
            note_type: DEFAULT_NOTE_TYPE.to_string(),
            max_chunk_tokens: DEFAULT_MAX_CHUNK_TOKENS,
            max_parallel_requests: DEFAULT_MAX_PARALLEL_REQUESTS,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            offline_queue_enabled: true,
            max_retries: DEFAULT_MAX_RETRIES,
            default_tags: Vec::new(),
            auto_sync_on_approval: true,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
        }
    }
}

impl Settings {
    /// Credential usable for generation calls, if any
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| is_valid_key(key))
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve runtime settings from environment and TOML
///
/// **Priority:** ENV → TOML → built-in defaults
pub fn resolve_settings(toml_config: &TomlConfig) -> Settings {
    let defaults = Settings::default();
    let generation = &toml_config.generation;
    let store = &toml_config.store;

    let api_key = resolve_api_key(generation.api_key.as_deref());

    let model = env_value(MODEL_ENV)
        .or_else(|| generation.model.clone())
        .unwrap_or(defaults.model);

    let store_url = env_value(STORE_URL_ENV)
        .or_else(|| store.url.clone())
        .unwrap_or(defaults.store_url);

    let deck_name = env_value(DECK_ENV)
        .or_else(|| store.deck.clone())
        .unwrap_or(defaults.deck_name);

    let mut max_chunk_tokens = generation
        .max_chunk_tokens
        .unwrap_or(defaults.max_chunk_tokens);
    if max_chunk_tokens < MIN_CHUNK_TOKENS {
        warn!(
            requested = max_chunk_tokens,
            minimum = MIN_CHUNK_TOKENS,
            "max_chunk_tokens too small, clamping"
        );
        max_chunk_tokens = MIN_CHUNK_TOKENS;
    }

    let mut max_parallel_requests = generation
        .max_parallel_requests
        .unwrap_or(defaults.max_parallel_requests);
    if max_parallel_requests == 0 {
        warn!("max_parallel_requests = 0 is invalid, using 1");
        max_parallel_requests = 1;
    }

    Settings {
        api_key,
        model,
        generation_endpoint: generation
            .endpoint
            .clone()
            .unwrap_or(defaults.generation_endpoint),
        store_url,
        deck_name,
        note_type: store.note_type.clone().unwrap_or(defaults.note_type),
        max_chunk_tokens,
        max_parallel_requests,
        batch_delay: generation
            .batch_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.batch_delay),
        offline_queue_enabled: store.offline_queue.unwrap_or(defaults.offline_queue_enabled),
        max_retries: store.max_retries.unwrap_or(defaults.max_retries),
        default_tags: generation.default_tags.clone().unwrap_or_default(),
        auto_sync_on_approval: store.auto_sync.unwrap_or(defaults.auto_sync_on_approval),
        sync_interval: store
            .sync_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.sync_interval),
    }
}

/// Resolve generation credential
///
/// **Priority:** ENV → TOML. Returns `None` when neither holds a usable key;
/// the orchestrator turns that into a configuration error on first use.
fn resolve_api_key(toml_key: Option<&str>) -> Option<String> {
    let env_key = env_value(API_KEY_ENV);
    let toml_key = toml_key.filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Generation API key found in multiple sources: environment, TOML. Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!("Generation API key loaded from environment variable");
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!("Generation API key loaded from TOML config");
        return Some(key.to_string());
    }

    warn!(
        "Generation API key not configured. Set {} or [generation] api_key in the config file",
        API_KEY_ENV
    );
    None
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| is_valid_key(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("sk-123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   \t"));
    }

    #[test]
    fn test_credential_filters_blank_key() {
        let settings = Settings {
            api_key: Some("  ".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.credential(), None);

        let settings = Settings {
            api_key: Some("sk-abc".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.credential(), Some("sk-abc"));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_parallel_requests, 3);
        assert_eq!(settings.max_retries, 3);
        assert!(settings.offline_queue_enabled);
        assert_eq!(settings.batch_delay, Duration::from_millis(1000));
    }
}
