use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "METAWRITER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/metawriter.toml";
const ENV_PREFIX: &str = "METAWRITER";
const ENV_SEPARATOR: &str = "__";

/// Path of the configuration file: `METAWRITER_CONFIG`, else the default
fn config_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    load_from(config_path())
}

/// Same layering as [`load`], with an explicit file path
pub fn load_from(config_path: PathBuf) -> Result<Config, ConfigError> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    load_from_sources(config_path)
}

/// Load configuration from a specific path and the process environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    build(config_path, environment())
}

/// METAWRITER__STORAGE__PROVIDER -> storage.provider
/// METAWRITER__HANDLERS__ENABLED=ole2,custom -> handlers.enabled
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .list_separator(",")
        .with_list_parse_key("handlers.enabled")
        .try_parsing(true)
}

fn build(config_path: PathBuf, environment: Environment) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    builder = builder.add_source(environment);

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageProvider;
    use config::Map;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.storage.provider, StorageProvider::Memory);
        assert_eq!(config.handlers.enabled, vec!["ole2"]);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[storage]
provider = "local"
root = "data/content"
max_content_bytes = "8MB"

[logging]
filter = "metawriter=debug"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.storage.provider, StorageProvider::Local);
        assert_eq!(
            config.storage.root.as_deref(),
            Some(std::path::Path::new("data/content"))
        );
        assert_eq!(config.storage.max_content_bytes.as_u64(), 8 * 1024 * 1024);
        assert_eq!(config.logging.filter, "metawriter=debug");
    }

    /// Variables taken from `vars` instead of the process environment
    fn environment_from(vars: Map<String, String>) -> Environment {
        environment().source(Some(vars))
    }

    fn vars(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_environment_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let environment = environment_from(vars(&[
            ("METAWRITER__STORAGE__PROVIDER", "local"),
            ("METAWRITER__STORAGE__ROOT", "/srv/content"),
            ("METAWRITER__STORAGE__MAX_CONTENT_BYTES", "2MB"),
            ("METAWRITER__HANDLERS__ENABLED", "ole2,legacy"),
            ("OTHERAPP__STORAGE__PROVIDER", "memory"),
        ]));

        let config = build(config_path, environment).unwrap();
        assert_eq!(config.storage.provider, StorageProvider::Local);
        assert_eq!(
            config.storage.root.as_deref(),
            Some(std::path::Path::new("/srv/content"))
        );
        assert_eq!(config.storage.max_content_bytes.as_u64(), 2 * 1024 * 1024);
        assert_eq!(config.handlers.enabled, vec!["ole2", "legacy"]);
    }

    #[test]
    fn test_dotenv_file_overrides_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[storage]
provider = \"memory\"
").unwrap();

        let dotenv_path = temp_dir.path().join(".env");
        fs::write(
            &dotenv_path,
            "# local overrides
METAWRITER__STORAGE__PROVIDER=local
METAWRITER__HANDLERS__ENABLED=ole2
",
        )
        .unwrap();
        let from_file = dotenvy::from_path_iter(&dotenv_path)
            .unwrap()
            .collect::<Result<Map<String, String>, _>>()
            .unwrap();

        let config = build(config_path, environment_from(from_file)).unwrap();
        assert_eq!(config.storage.provider, StorageProvider::Local);
        assert_eq!(config.handlers.enabled, vec!["ole2"]);
    }

    #[test]
    fn test_integer_byte_size() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[storage]\nmax_content_bytes = 4096\n").unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.storage.max_content_bytes.as_u64(), 4096);
    }
}
