//! Application configuration for ClearMind.
//!
//! User config lives at `~/.clearmind/clearmind.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ClearMindError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "clearmind.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".clearmind";

/// Default database file name inside the config directory.
const DATABASE_FILE_NAME: &str = "clearmind.db";

// ---------------------------------------------------------------------------
// Config structs (matching clearmind.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-model endpoint settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the generative-language API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature. Kept low so answers are stable.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on one model call, after which the call counts as a transport error.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_request_timeout() -> u64 {
    30
}

impl ModelConfig {
    /// Check the values that would otherwise fail at request time.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.endpoint).map_err(|e| {
            ClearMindError::config(format!("invalid model endpoint '{}': {e}", self.endpoint))
        })?;
        if self.model.trim().is_empty() {
            return Err(ClearMindError::config("model name must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ClearMindError::config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClearMindError::config("request_timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the local database. Defaults to `~/.clearmind/clearmind.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

impl StorageConfig {
    /// Resolve the database path, falling back to the config directory.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(config_dir()?.join(DATABASE_FILE_NAME)),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.clearmind/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ClearMindError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.clearmind/clearmind.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ClearMindError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ClearMindError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.model.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ClearMindError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ClearMindError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ClearMindError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("endpoint"));
        assert!(toml_str.contains("request_timeout_secs = 30"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.model.request_timeout_secs, 30);
        assert_eq!(parsed.model.model, "gemini-2.0-flash");
        assert!(parsed.storage.database_path.is_none());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[model]
model = "gemini-1.5-pro"

[storage]
database_path = "/tmp/clearmind-test.db"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.model.model, "gemini-1.5-pro");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(
            config.storage.resolved_path().unwrap(),
            PathBuf::from("/tmp/clearmind-test.db")
        );
    }

    #[test]
    fn default_model_config_is_valid() {
        ModelConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad_endpoint = ModelConfig {
            endpoint: "not a url".into(),
            ..ModelConfig::default()
        };
        assert!(bad_endpoint.validate().is_err());

        let hot = ModelConfig {
            temperature: 3.5,
            ..ModelConfig::default()
        };
        assert!(hot.validate().unwrap_err().to_string().contains("temperature"));

        let no_timeout = ModelConfig {
            request_timeout_secs: 0,
            ..ModelConfig::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("clearmind.toml");
        std::fs::write(&path, "[model]\nrequest_timeout_secs = 5\n").unwrap();

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.model.request_timeout_secs, 5);
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("clearmind.toml");
        std::fs::write(&path, "[model]\ntemperature = 9.0\n").unwrap();

        assert!(load_config_from(&path).is_err());
    }
}
