//! Compound binary file (OLE2) metadata
//!
//! Legacy Word, Excel and PowerPoint documents are OLE2 containers. Their
//! document properties live in two property set streams inside the
//! container; [`PropertySet`] reads and writes those streams and
//! [`OleContentFacade`] exposes them as named metadata fields. The container
//! itself is handled by the `cfb` crate.

mod facade;
pub mod property_set;

pub use facade::{
    DOC_SUMMARY_STREAM, OleContentFacade, SUMMARY_STREAM, datetime_to_filetime,
    filetime_to_datetime,
};
pub use property_set::{ClassId, PropertySet, PropertySetError, PropertyValue, Section};
