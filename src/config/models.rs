use crate::handlers::DuplicatePolicy;
use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub handlers: HandlersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Memory,
    Local,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Root directory of the local provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Readers refuse content above this size
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: ByteSize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Memory,
            root: None,
            max_content_bytes: default_max_content_bytes(),
        }
    }
}

fn default_max_content_bytes() -> ByteSize {
    ByteSize(64 * 1024 * 1024) // 64 MB
}

/// Handler wiring
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandlersConfig {
    /// Handler names in registration order; earlier entries win shared MIME types
    #[serde(default = "default_enabled_handlers")]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub duplicate_claims: DuplicatePolicy,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_handlers(),
            duplicate_claims: DuplicatePolicy::default(),
        }
    }
}

fn default_enabled_handlers() -> Vec<String> {
    vec!["ole2".to_string()]
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.provider, StorageProvider::Memory);
        assert_eq!(config.storage.max_content_bytes.as_u64(), 64 * 1024 * 1024);
        assert_eq!(config.handlers.enabled, vec!["ole2"]);
        assert_eq!(config.handlers.duplicate_claims, DuplicatePolicy::FirstWins);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_parse_from_toml() {
        let config: Config = toml::from_str(
            r#"
[storage]
provider = "local"
root = "/var/lib/metawriter"
max_content_bytes = "16MB"

[handlers]
enabled = ["ole2"]
duplicate_claims = "reject"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.provider, StorageProvider::Local);
        assert_eq!(config.storage.max_content_bytes.as_u64(), 16 * 1024 * 1024);
        assert_eq!(config.handlers.duplicate_claims, DuplicatePolicy::Reject);
        assert_eq!(config.logging.filter, "info");
    }
}
