use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use thiserror::Error;

use crate::content::{ContentOutput, ContentReader, ContentWriter};
use crate::ole::PropertySetError;

/// Handler errors: anything that goes wrong once a handler has been chosen
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt container: {0}")]
    Corrupt(String),
    #[error("invalid property set: {0}")]
    PropertySet(#[from] PropertySetError),
    #[error("invalid metadata field '{0}'")]
    InvalidField(String),
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A metadata value as seen by callers of a [`ContentFacade`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Boolean(bool),
    Integer(i32),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

/// Live metadata view over one content item.
///
/// Changes stay in memory until [`ContentFacade::save`] writes the item to
/// its output stream. [`ContentFacade::abort`] (or simply dropping the
/// facade) releases the output without writing anything.
pub trait ContentFacade: Send {
    /// Every readable field with its current value
    fn fields(&self) -> Vec<(String, MetadataValue)>;

    fn read_metadata(&self, field: &str) -> Option<MetadataValue>;

    fn write_metadata(&mut self, field: &str, value: MetadataValue) -> Result<(), HandlerError>;

    /// Serialize the item to the output stream and commit it
    fn save(self: Box<Self>) -> Result<(), HandlerError>;

    fn abort(self: Box<Self>);
}

/// Format handler: declares the MIME types it understands and builds
/// facades for them.
///
/// Handlers are stateless; every `create` call is an independent
/// construction.
pub trait FormatHandler: Send + Sync {
    /// Stable name used in configuration
    fn name(&self) -> &str;

    /// MIME types this handler claims, lowercase
    fn mime_types(&self) -> &[&'static str];

    /// Case-insensitive match against [`FormatHandler::mime_types`]
    fn supports(&self, mimetype: &str) -> bool {
        let mimetype = normalize_mimetype(mimetype);
        self.mime_types()
            .iter()
            .any(|claimed| claimed.eq_ignore_ascii_case(&mimetype))
    }

    /// Open both streams through the host and build the facade
    fn create(
        &self,
        reader: Box<dyn ContentReader>,
        writer: Box<dyn ContentWriter>,
    ) -> Result<Box<dyn ContentFacade>, HandlerError> {
        let input = reader.into_input_stream()?;
        let output = writer.into_output_stream()?;
        self.create_from_streams(input, output)
    }

    /// Build the facade over streams the caller already holds
    fn create_from_streams(
        &self,
        input: Box<dyn Read + Send>,
        output: Box<dyn ContentOutput>,
    ) -> Result<Box<dyn ContentFacade>, HandlerError>;
}

/// Lowercase `type/subtype` with parameters stripped; falls back to the
/// trimmed, lowercased input when it does not parse as a media type
pub fn normalize_mimetype(mimetype: &str) -> String {
    let trimmed = mimetype.trim();
    match trimmed.parse::<mime::Mime>() {
        Ok(parsed) => parsed.essence_str().to_ascii_lowercase(),
        Err(_) => trimmed.to_ascii_lowercase(),
    }
}
