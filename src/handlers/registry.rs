use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use thiserror::Error;

use super::ole::OleHandler;
use super::traits::{FormatHandler, normalize_mimetype};
use crate::config::HandlersConfig;

/// Handler names accepted in configuration
pub const KNOWN_HANDLERS: &[&str] = &[OleHandler::NAME];

/// What to do when a handler claims a MIME type that is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the earlier registration, log the shadowed claim
    #[default]
    FirstWins,
    /// Fail the registration
    Reject,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler '{handler}' claims {mimetype}, already claimed by '{existing}'")]
    DuplicateClaim {
        mimetype: String,
        existing: String,
        handler: String,
    },
    #[error("handler not found: {0}")]
    NotFound(String),
    #[error("no format handlers registered")]
    Empty,
}

/// Ordered set of format handlers with a MIME-type index.
///
/// Built once at wiring time and read-only afterwards; clones share the
/// handler instances.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn FormatHandler>>,
    /// Normalized MIME type -> index of the handler that owns it
    by_mimetype: HashMap<String, usize>,
    policy: DuplicatePolicy,
}

impl HandlerRegistry {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            handlers: Vec::new(),
            by_mimetype: HashMap::new(),
            policy,
        }
    }

    pub fn register(&mut self, handler: Arc<dyn FormatHandler>) -> Result<(), RegistryError> {
        let claims: Vec<String> = handler
            .mime_types()
            .iter()
            .map(|m| normalize_mimetype(m))
            .collect();

        // Reject is all-or-nothing: check every claim before indexing any
        if self.policy == DuplicatePolicy::Reject {
            if let Some((mimetype, index)) = claims
                .iter()
                .find_map(|m| self.by_mimetype.get(m).map(|index| (m, *index)))
            {
                return Err(RegistryError::DuplicateClaim {
                    mimetype: mimetype.clone(),
                    existing: self.handlers[index].name().to_string(),
                    handler: handler.name().to_string(),
                });
            }
        }

        let index = self.handlers.len();
        for mimetype in claims {
            match self.by_mimetype.entry(mimetype) {
                Entry::Occupied(entry) => tracing::warn!(
                    mimetype = %entry.key(),
                    existing = self.handlers[*entry.get()].name(),
                    handler = handler.name(),
                    "MIME type already claimed, keeping first registration"
                ),
                Entry::Vacant(entry) => {
                    entry.insert(index);
                }
            }
        }

        tracing::debug!(handler = handler.name(), index, "Registered format handler");
        self.handlers.push(handler);
        Ok(())
    }

    /// First registered handler supporting the MIME type
    pub fn find(&self, mimetype: &str) -> Option<Arc<dyn FormatHandler>> {
        let normalized = normalize_mimetype(mimetype);
        if normalized.is_empty() {
            return None;
        }

        if let Some(index) = self.by_mimetype.get(&normalized) {
            return Some(Arc::clone(&self.handlers[*index]));
        }

        // Handlers may accept more than they declare
        self.handlers
            .iter()
            .find(|handler| handler.supports(mimetype))
            .cloned()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn FormatHandler>, RegistryError> {
        self.handlers
            .iter()
            .find(|handler| handler.name() == name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registry with the built-in handlers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new(DuplicatePolicy::FirstWins);
        registry
            .register(Arc::new(OleHandler::new()))
            .expect("empty registry accepts any handler");
        registry
    }

    /// Registry wired from configuration, in `enabled` order
    pub fn from_config(config: &HandlersConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new(config.duplicate_claims);
        for name in &config.enabled {
            registry.register(build_handler(name)?)?;
        }

        if registry.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(registry)
    }
}

fn build_handler(name: &str) -> Result<Arc<dyn FormatHandler>, RegistryError> {
    match name {
        OleHandler::NAME => Ok(Arc::new(OleHandler::new())),
        other => Err(RegistryError::NotFound(other.to_string())),
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
