//! Content service backed by the Apache Arrow `object_store` crate
//!
//! The store is async; this service drives it on a private current-thread
//! runtime so the dispatcher above stays synchronous.

use bytes::Bytes;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, ObjectMeta, ObjectStore, PutMode,
    PutOptions, PutPayload, local::LocalFileSystem, memory::InMemory, path::Path as StoragePath,
};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use super::{
    ContentOutput, ContentReader, ContentRef, ContentService, ContentWriter, Result, StorageError,
};
use crate::config::{StorageConfig, StorageProvider};

const DEFAULT_MAX_CONTENT_BYTES: u64 = 64 * 1024 * 1024;

/// Content service over any `object_store` backend
///
/// # Panics
///
/// Every call blocks on an internal current-thread runtime and panics when
/// made from inside a Tokio runtime. Async callers go through
/// `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct ObjectContentService {
    store: Arc<dyn ObjectStore>,
    runtime: Arc<Runtime>,
    /// Backend keeps per-object attributes (content type)
    attributes: bool,
    max_content_bytes: u64,
}

impl ObjectContentService {
    /// Wrap an existing backend.
    ///
    /// `supports_attributes` must be false for backends that reject
    /// attributes on put (the local filesystem store does).
    pub fn new(store: Arc<dyn ObjectStore>, supports_attributes: bool) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(StorageError::Runtime)?;

        Ok(Self {
            store,
            runtime: Arc::new(runtime),
            attributes: supports_attributes,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        })
    }

    /// In-memory content for testing/development
    pub fn in_memory() -> Result<Self> {
        Self::new(Arc::new(InMemory::new()), true)
    }

    /// Content rooted in a local directory, created if missing
    pub fn local(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        Self::new(Arc::new(store), false)
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let service = match config.provider {
            StorageProvider::Memory => Self::in_memory()?,
            StorageProvider::Local => {
                let root = config.root.as_deref().ok_or(StorageError::MissingRoot)?;
                Self::local(root)?
            }
        };

        Ok(service.with_max_content_bytes(config.max_content_bytes.as_u64()))
    }

    pub fn with_max_content_bytes(mut self, limit: u64) -> Self {
        self.max_content_bytes = limit;
        self
    }

    /// Store content under a reference, replacing whatever was there
    pub fn put_content(
        &self,
        content: &ContentRef,
        data: Vec<u8>,
        mimetype: Option<&str>,
    ) -> Result<()> {
        let path = StoragePath::from(content.object_key());
        let size = data.len();

        let mut attributes = Attributes::new();
        if let (true, Some(mimetype)) = (self.attributes, mimetype) {
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(mimetype.to_string()),
            );
        }

        let opts = PutOptions {
            attributes,
            ..Default::default()
        };
        self.runtime
            .block_on(self.store.put_opts(&path, PutPayload::from(data), opts))?;

        tracing::info!(content = %content, size, "Stored content");
        Ok(())
    }

    /// Fetch the full content of a reference
    pub fn get_content(&self, content: &ContentRef) -> Result<Bytes> {
        let path = StoragePath::from(content.object_key());
        let bytes = self.runtime.block_on(async {
            let result = self.store.get(&path).await?;
            result.bytes().await
        })?;

        Ok(bytes)
    }

    /// Object metadata and attributes, or `None` if the object is missing
    fn head(&self, path: &StoragePath) -> Result<Option<(ObjectMeta, Attributes)>> {
        let options = GetOptions {
            head: true,
            ..Default::default()
        };

        match self.runtime.block_on(self.store.get_opts(path, options)) {
            Ok(result) => Ok(Some((result.meta, result.attributes))),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Content type attribute first, then a guess from the key's extension
fn resolve_mimetype(path: &StoragePath, attributes: &Attributes) -> Option<String> {
    if let Some(value) = attributes.get(&Attribute::ContentType) {
        let value: &str = value.as_ref();
        return Some(value.to_string());
    }

    let key: &str = path.as_ref();
    mime_guess::from_path(key).first_raw().map(str::to_string)
}

impl ContentService for ObjectContentService {
    fn reader(&self, content: &ContentRef) -> Result<Option<Box<dyn ContentReader>>> {
        let path = StoragePath::from(content.object_key());

        let (meta, mimetype) = match self.head(&path)? {
            Some((meta, attributes)) => {
                let mimetype = resolve_mimetype(&path, &attributes);
                (Some(meta), mimetype)
            }
            None => (None, None),
        };

        tracing::debug!(
            content = %content,
            exists = meta.is_some(),
            mimetype = mimetype.as_deref().unwrap_or(""),
            "Opened content reader"
        );

        Ok(Some(Box::new(ObjectReader {
            store: Arc::clone(&self.store),
            runtime: Arc::clone(&self.runtime),
            path,
            meta,
            mimetype,
            limit: self.max_content_bytes,
        })))
    }

    fn writer(
        &self,
        content: &ContentRef,
        overwrite: bool,
    ) -> Result<Option<Box<dyn ContentWriter>>> {
        let path = StoragePath::from(content.object_key());

        // Overwrites keep the content type the item already has
        let attributes = match self.head(&path)? {
            Some((_, attributes)) if self.attributes => attributes,
            _ => Attributes::new(),
        };

        let mode = if overwrite {
            PutMode::Overwrite
        } else {
            PutMode::Create
        };

        Ok(Some(Box::new(ObjectWriter {
            store: Arc::clone(&self.store),
            runtime: Arc::clone(&self.runtime),
            path,
            mode,
            attributes,
        })))
    }
}

struct ObjectReader {
    store: Arc<dyn ObjectStore>,
    runtime: Arc<Runtime>,
    path: StoragePath,
    meta: Option<ObjectMeta>,
    mimetype: Option<String>,
    limit: u64,
}

impl ContentReader for ObjectReader {
    fn exists(&self) -> bool {
        self.meta.is_some()
    }

    fn mimetype(&self) -> Option<&str> {
        self.mimetype.as_deref()
    }

    fn size(&self) -> Option<u64> {
        self.meta.as_ref().map(|meta| meta.size)
    }

    fn into_input_stream(self: Box<Self>) -> io::Result<Box<dyn Read + Send>> {
        let reader = *self;
        let Some(meta) = reader.meta else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no content at {}", reader.path),
            ));
        };

        if meta.size > reader.limit {
            return Err(io::Error::other(StorageError::TooLarge {
                size: meta.size,
                limit: reader.limit,
            }));
        }

        let bytes = reader
            .runtime
            .block_on(async {
                let result = reader.store.get(&reader.path).await?;
                result.bytes().await
            })
            .map_err(io::Error::other)?;

        tracing::debug!(path = %reader.path, size = bytes.len(), "Downloaded content");
        Ok(Box::new(Cursor::new(bytes)))
    }
}

struct ObjectWriter {
    store: Arc<dyn ObjectStore>,
    runtime: Arc<Runtime>,
    path: StoragePath,
    mode: PutMode,
    attributes: Attributes,
}

impl ContentWriter for ObjectWriter {
    fn into_output_stream(self: Box<Self>) -> io::Result<Box<dyn ContentOutput>> {
        let writer = *self;
        Ok(Box::new(ObjectOutput {
            store: writer.store,
            runtime: writer.runtime,
            path: writer.path,
            mode: writer.mode,
            attributes: writer.attributes,
            buffer: Vec::new(),
            committed: false,
        }))
    }
}

/// Buffers everything written and uploads it in one put on commit
struct ObjectOutput {
    store: Arc<dyn ObjectStore>,
    runtime: Arc<Runtime>,
    path: StoragePath,
    mode: PutMode,
    attributes: Attributes,
    buffer: Vec<u8>,
    committed: bool,
}

impl Write for ObjectOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ContentOutput for ObjectOutput {
    fn commit(mut self: Box<Self>) -> io::Result<()> {
        let data = std::mem::take(&mut self.buffer);
        let size = data.len();
        let opts = PutOptions {
            mode: self.mode.clone(),
            attributes: self.attributes.clone(),
            ..Default::default()
        };

        self.runtime
            .block_on(self.store.put_opts(&self.path, PutPayload::from(data), opts))
            .map_err(io::Error::other)?;
        self.committed = true;

        tracing::info!(path = %self.path, size, "Committed content");
        Ok(())
    }
}

impl Drop for ObjectOutput {
    fn drop(&mut self) {
        if !self.committed {
            tracing::warn!(
                path = %self.path,
                buffered = self.buffer.len(),
                "Discarding uncommitted output"
            );
        }
    }
}
