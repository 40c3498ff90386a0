//! Bootstrap configuration loading
//!
//! The TOML file carries everything the pipeline needs to start: logging, the
//! database location, and the generation/store sections. Every field is
//! optional. Runtime resolution (environment overrides, validation, built-in
//! defaults) happens in the consuming crate.
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `CARDGEN_CONFIG` environment variable
//! 3. `<config_dir>/cardgen/config.toml`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CARDGEN_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Path to SQLite database file holding the delivery queue
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Generation service section
    #[serde(default)]
    pub generation: GenerationToml,

    /// Card store section
    #[serde(default)]
    pub store: StoreToml,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[generation]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerationToml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub max_chunk_tokens: Option<usize>,
    pub max_parallel_requests: Option<usize>,
    pub batch_delay_ms: Option<u64>,
    pub default_tags: Option<Vec<String>>,
}

/// `[store]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreToml {
    pub url: Option<String>,
    pub deck: Option<String>,
    pub note_type: Option<String>,
    pub offline_queue: Option<bool>,
    pub max_retries: Option<u32>,
    pub auto_sync: Option<bool>,
    pub sync_interval_secs: Option<u64>,
}

/// Resolve which config file to read
///
/// Returns `None` when no candidate location can be determined.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("cardgen").join("config.toml"))
}

/// Load TOML configuration
///
/// A missing file is not an error: a warning is logged and defaults are used.
/// A file that exists but fails to parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Default database location: `<data_local_dir>/cardgen/cardgen.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cardgen"))
        .unwrap_or_else(|| PathBuf::from("./cardgen_data"))
        .join("cardgen.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }

    #[test]
    fn test_default_database_path_is_named() {
        let path = default_database_path();
        assert_eq!(path.file_name().unwrap(), "cardgen.db");
    }

    #[test]
    fn test_empty_toml_parses_to_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert!(config.database_path.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.generation.api_key.is_none());
        assert!(config.store.url.is_none());
    }
}
