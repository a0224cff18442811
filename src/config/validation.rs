use super::models::{Config, StorageProvider};
use crate::handlers::KNOWN_HANDLERS;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No handlers enabled (at least one format handler is required)")]
    NoHandlersEnabled,

    #[error("Unknown handler '{name}' (known: {known})")]
    UnknownHandler { name: String, known: String },

    #[error("Handler '{name}' is enabled more than once")]
    DuplicateHandler { name: String },

    #[error("Storage provider is local but no root directory is configured")]
    MissingLocalRoot,

    #[error("max_content_bytes must be positive")]
    InvalidMaxContentBytes,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_handlers(config)?;
    validate_storage(config)?;
    Ok(())
}

/// Enabled handlers must be non-empty, known and listed once
fn validate_handlers(config: &Config) -> Result<(), ValidationError> {
    if config.handlers.enabled.is_empty() {
        return Err(ValidationError::NoHandlersEnabled);
    }

    let mut seen = HashSet::new();
    for name in &config.handlers.enabled {
        if !KNOWN_HANDLERS.contains(&name.as_str()) {
            return Err(ValidationError::UnknownHandler {
                name: name.clone(),
                known: KNOWN_HANDLERS.join(", "),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(ValidationError::DuplicateHandler { name: name.clone() });
        }
    }

    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.provider == StorageProvider::Local && config.storage.root.is_none() {
        return Err(ValidationError::MissingLocalRoot);
    }

    if config.storage.max_content_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidMaxContentBytes);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_no_handlers() {
        let mut config = Config::default();
        config.handlers.enabled.clear();

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::NoHandlersEnabled)));
    }

    #[test]
    fn test_unknown_handler() {
        let mut config = Config::default();
        config.handlers.enabled.push("pdf".to_string());

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::UnknownHandler { .. })));
    }

    #[test]
    fn test_repeated_handler() {
        let mut config = Config::default();
        config.handlers.enabled.push("ole2".to_string());

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::DuplicateHandler { .. })));
    }

    #[test]
    fn test_local_requires_root() {
        let mut config = Config::default();
        config.storage.provider = StorageProvider::Local;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::MissingLocalRoot)));
    }

    #[test]
    fn test_zero_content_limit() {
        let mut config = Config::default();
        config.storage.max_content_bytes = ByteSize(0);

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::InvalidMaxContentBytes)));
    }
}
