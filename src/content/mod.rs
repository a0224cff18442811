//! Host content boundary
//!
//! The dispatcher never touches storage directly. It asks a [`ContentService`]
//! for a reader or a writer bound to a [`ContentRef`], and hands the streams
//! those produce to a format handler. "No content" is an `Ok(None)` from the
//! service, never a null handle.
//!
//! [`ObjectContentService`] is the bundled host, backed by `object_store`.

mod reference;
mod store;

pub use reference::ContentRef;
pub use store::ObjectContentService;

use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid content reference: {0}")]
    InvalidReference(String),

    #[error("Local storage requires a root directory")]
    MissingRoot,

    #[error("Content too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Failed to start storage runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Read side of a stored content item
pub trait ContentReader: Send {
    /// Whether the item actually has content behind it
    fn exists(&self) -> bool;

    /// MIME type recorded for the content, if any
    fn mimetype(&self) -> Option<&str>;

    /// Content length in bytes, when known
    fn size(&self) -> Option<u64>;

    /// Open the content for reading. Consumes the reader.
    fn into_input_stream(self: Box<Self>) -> io::Result<Box<dyn Read + Send>>;
}

/// Write side of a stored content item
pub trait ContentWriter: Send {
    /// Open the output stream. Consumes the writer.
    fn into_output_stream(self: Box<Self>) -> io::Result<Box<dyn ContentOutput>>;
}

/// Output stream that only reaches the store on [`ContentOutput::commit`].
///
/// Dropping an output without committing releases it and leaves the stored
/// content untouched.
pub trait ContentOutput: Write + Send {
    fn commit(self: Box<Self>) -> io::Result<()>;
}

/// Adapts any writer into a [`ContentOutput`] whose commit is a flush.
///
/// For callers that already hold an open stream and bypass the host.
pub struct WriteOutput<W> {
    inner: W,
}

impl<W: Write + Send> WriteOutput<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn boxed(inner: W) -> Box<dyn ContentOutput>
    where
        W: 'static,
    {
        Box::new(Self::new(inner))
    }
}

impl<W: Write + Send> Write for WriteOutput<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> ContentOutput for WriteOutput<W> {
    fn commit(mut self: Box<Self>) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Content storage and stream provisioning offered by the host
pub trait ContentService: Send + Sync {
    /// Reader for the item, or `None` if the reference carries no content
    /// (containers and the like).
    fn reader(&self, content: &ContentRef) -> Result<Option<Box<dyn ContentReader>>>;

    /// Writer for the item, or `None` if the host refuses to provide one.
    fn writer(
        &self,
        content: &ContentRef,
        overwrite: bool,
    ) -> Result<Option<Box<dyn ContentWriter>>>;
}
