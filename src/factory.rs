//! Metadata content dispatch
//!
//! [`MetadataContentFactory`] resolves a content item's MIME type through the
//! host, picks the first registered handler that supports it and returns the
//! handler's facade. Nothing is cached between calls.

use std::sync::Arc;
use thiserror::Error;

use crate::content::{ContentReader, ContentRef, ContentService, StorageError};
use crate::handlers::{ContentFacade, FormatHandler, HandlerError, HandlerRegistry, RegistryError};
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum FactoryError {
    /// The host cannot supply usable content, or its MIME type is blank
    #[error("Content not accessible: {0}")]
    ContentAccess(String),

    #[error("No handler supports MIME type '{0}'")]
    UnsupportedFormat(String),

    #[error("Handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, FactoryError>;

#[derive(Clone)]
pub struct MetadataContentFactory {
    service: Arc<dyn ContentService>,
    registry: Arc<HandlerRegistry>,
    metrics: Arc<Metrics>,
}

impl MetadataContentFactory {
    /// Wire a factory. The registry must hold at least one handler.
    pub fn new(service: Arc<dyn ContentService>, registry: Arc<HandlerRegistry>) -> Result<Self> {
        if registry.is_empty() {
            return Err(RegistryError::Empty.into());
        }

        Ok(Self {
            service,
            registry,
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Build a metadata facade over the item.
    ///
    /// The reader used for MIME lookup is the one whose stream feeds the
    /// handler. The writer is opened in overwrite mode.
    ///
    /// # Errors
    ///
    /// - [`FactoryError::ContentAccess`] if the item is missing, has no MIME
    ///   type, or the host refuses a writer
    /// - [`FactoryError::UnsupportedFormat`] if no handler claims the type
    /// - [`FactoryError::Handler`] if the streams cannot be opened or parsed
    pub fn create_content(&self, content_ref: &ContentRef) -> Result<Box<dyn ContentFacade>> {
        let reader = self.open_reader(content_ref)?;

        let Some(mimetype) = mimetype_of(reader.as_ref()) else {
            self.metrics.access_failure();
            return Err(FactoryError::ContentAccess(format!(
                "{content_ref} has no MIME type"
            )));
        };

        let Some(handler) = self.registry.find(&mimetype) else {
            self.metrics.unsupported_format();
            tracing::debug!(%content_ref, %mimetype, "No handler for MIME type");
            return Err(FactoryError::UnsupportedFormat(mimetype));
        };

        let Some(writer) = self.service.writer(content_ref, true)? else {
            self.metrics.access_failure();
            return Err(FactoryError::ContentAccess(format!(
                "{content_ref} cannot be opened for writing"
            )));
        };

        tracing::debug!(
            %content_ref,
            %mimetype,
            handler = handler.name(),
            "Dispatching to format handler"
        );

        let facade = handler.create(reader, writer)?;
        self.metrics.facade_created();
        Ok(facade)
    }

    /// Whether a handler exists for the item's MIME type.
    ///
    /// A blank type or an unclaimed type is `Ok(false)`. A missing item is an
    /// error, as for [`MetadataContentFactory::create_content`]. Never opens a
    /// writer.
    pub fn supports_metadata_write(&self, content_ref: &ContentRef) -> Result<bool> {
        self.metrics.probe();
        let supported = self.select_handler(content_ref)?.is_some();
        tracing::debug!(%content_ref, supported, "Probed metadata support");
        Ok(supported)
    }

    /// Name of the handler [`MetadataContentFactory::create_content`] would use
    pub fn handler_for(&self, content_ref: &ContentRef) -> Result<Option<String>> {
        Ok(self
            .select_handler(content_ref)?
            .map(|handler| handler.name().to_string()))
    }

    fn select_handler(&self, content_ref: &ContentRef) -> Result<Option<Arc<dyn FormatHandler>>> {
        let reader = self.open_reader(content_ref)?;
        Ok(mimetype_of(reader.as_ref()).and_then(|mimetype| self.registry.find(&mimetype)))
    }

    fn open_reader(&self, content_ref: &ContentRef) -> Result<Box<dyn ContentReader>> {
        match self.service.reader(content_ref)? {
            Some(reader) if reader.exists() => Ok(reader),
            Some(_) => {
                self.metrics.access_failure();
                Err(FactoryError::ContentAccess(format!(
                    "{content_ref} does not exist"
                )))
            }
            None => {
                self.metrics.access_failure();
                Err(FactoryError::ContentAccess(format!(
                    "no reader for {content_ref}"
                )))
            }
        }
    }
}

/// Reader's MIME type, `None` when unset or blank
fn mimetype_of(reader: &dyn ContentReader) -> Option<String> {
    reader
        .mimetype()
        .map(str::trim)
        .filter(|mimetype| !mimetype.is_empty())
        .map(str::to_string)
}
