//! Configuration management for metawriter
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Environment Variables
//!
//! Any key can be overridden with `METAWRITER__<section>__<key>`:
//! - `METAWRITER__STORAGE__PROVIDER=local`
//! - `METAWRITER__STORAGE__ROOT=/srv/content`
//! - `METAWRITER__HANDLERS__ENABLED=ole2`
//!
//! # Configuration File
//!
//! Loaded from `config/metawriter.toml` unless `METAWRITER_CONFIG` points
//! elsewhere. A missing file is not an error.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, HandlersConfig, LoggingConfig, StorageConfig, StorageProvider};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path (file + environment)
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::DuplicatePolicy;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[handlers]\nenabled = [\"ole2\"]\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.handlers.enabled, vec!["ole2"]);
    }

    #[test]
    fn test_validation_catches_unknown_handler() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[handlers]\nenabled = [\"ole2\", \"pdf\"]\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::UnknownHandler { .. })
        ));
    }

    #[test]
    fn test_validation_catches_missing_local_root() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[storage]\nprovider = \"local\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::MissingLocalRoot)
        ));
    }

    #[test]
    fn test_render_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[storage]
provider = "local"
root = "content"
max_content_bytes = "32MB"

[handlers]
enabled = ["ole2"]
duplicate_claims = "reject"

[logging]
filter = "warn"
        "#;
        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        let rendered = config.to_toml_string().unwrap();
        let reparsed: Config = toml::from_str(&rendered).unwrap();

        assert_eq!(reparsed.storage.provider, StorageProvider::Local);
        assert_eq!(reparsed.storage.max_content_bytes, ByteSize(32 * 1024 * 1024));
        assert_eq!(reparsed.handlers.duplicate_claims, DuplicatePolicy::Reject);
        assert_eq!(reparsed.logging.filter, "warn");
    }
}
