//! Format handlers
//!
//! A handler declares which MIME types it can read and rewrite metadata for,
//! and builds a [`ContentFacade`] over an item's streams.
//!
//! ## Key Components
//!
//! - [`FormatHandler`] - Capability trait implemented once per format family
//! - [`ContentFacade`] - Live metadata view returned to callers
//! - [`HandlerRegistry`] - Ordered handler set with a MIME-type index
//! - [`OleHandler`] - Built-in handler for Word, Excel and PowerPoint 97-2003
//!
//! ## Example
//!
//! ```rust,ignore
//! use metawriter::handlers::{HandlerRegistry, MetadataValue};
//!
//! let registry = HandlerRegistry::with_defaults();
//! let handler = registry.find("application/vnd.ms-excel").unwrap();
//!
//! let mut facade = handler.create_from_streams(input, output)?;
//! facade.write_metadata("title", MetadataValue::from("Q3 figures"))?;
//! facade.save()?;
//! ```

mod ole;
mod registry;
mod traits;

pub use ole::OleHandler;
pub use registry::{DuplicatePolicy, HandlerRegistry, KNOWN_HANDLERS, RegistryError};
pub use traits::{ContentFacade, FormatHandler, HandlerError, MetadataValue, normalize_mimetype};
