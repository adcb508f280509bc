//! Persisted config (snapshot path, Ollama settings, display defaults) in the app data directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app_data;
use crate::embedder::{DEFAULT_BASE_URL, DEFAULT_EMBED_MODEL, DEFAULT_TIMEOUT};
use crate::report::DEFAULT_HIDDEN_FIELDS;

const CONFIG_FILENAME: &str = "config.toml";

/// Number of matches returned when neither the caller nor the config sets one.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the corpus snapshot (JSON array or JSON Lines).
    pub snapshot_path: Option<String>,
    pub ollama_url: Option<String>,
    pub embed_model: Option<String>,
    pub embed_timeout_secs: Option<u64>,
    pub top_k: Option<usize>,
    /// Metadata columns left out of the results table. `None` uses the defaults.
    pub hidden_fields: Option<Vec<String>>,
}

impl Config {
    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn embed_model(&self) -> &str {
        self.embed_model.as_deref().unwrap_or(DEFAULT_EMBED_MODEL)
    }

    pub fn embed_timeout(&self) -> Duration {
        self.embed_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(DEFAULT_TOP_K)
    }

    pub fn hidden_fields(&self) -> Vec<String> {
        match &self.hidden_fields {
            Some(fields) => fields.clone(),
            None => DEFAULT_HIDDEN_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Parse config text. Invalid TOML is logged and replaced by the defaults.
pub fn parse_config(s: &str) -> Config {
    toml::from_str(s).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring invalid config");
        Config::default()
    })
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    let Some(data_dir) = app_data::app_data_dir() else {
        return Config::default();
    };
    let path = data_dir.join(CONFIG_FILENAME);
    let Ok(s) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    parse_config(&s)
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    let path = data_dir.join(CONFIG_FILENAME);
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(&path, s).map_err(ConfigError::Write)
}

/// Set and persist the snapshot path.
pub fn set_snapshot_path(path: &Path) -> Result<(), ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_file() {
        return Err(ConfigError::NotAFile(path));
    }
    let mut config = load_config();
    config.snapshot_path = Some(path.to_string_lossy().into_owned());
    save_config(&config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a file: {0}")]
    NotAFile(PathBuf),
}
