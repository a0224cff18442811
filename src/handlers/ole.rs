use std::io::Read;

use super::traits::{ContentFacade, FormatHandler, HandlerError};
use crate::content::ContentOutput;
use crate::ole::OleContentFacade;

/// Handler for the binary office family: Word, Excel and PowerPoint 97-2003.
///
/// All three are compound binary files, so one facade serves them all.
#[derive(Debug, Clone, Copy, Default)]
pub struct OleHandler;

impl OleHandler {
    pub const NAME: &'static str = "ole2";

    pub const MIME_TYPES: &'static [&'static str] = &[
        "application/msword",
        "application/vnd.ms-excel",
        "application/vnd.ms-powerpoint",
    ];

    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for OleHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn mime_types(&self) -> &[&'static str] {
        Self::MIME_TYPES
    }

    fn create_from_streams(
        &self,
        input: Box<dyn Read + Send>,
        output: Box<dyn ContentOutput>,
    ) -> Result<Box<dyn ContentFacade>, HandlerError> {
        Ok(Box::new(OleContentFacade::open(input, output)?))
    }
}
