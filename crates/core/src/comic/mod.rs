//! Plain comic archives read page by page (DIVINA-style media containers).

mod zip_extractor;

pub use zip_extractor::ZipExtractor;

use std::path::Path;

use crate::error::ExtractError;
use crate::model::{MediaContainerEntry, TypedBytes};

/// An extractor for one family of comic containers.
pub trait DivinaExtractor: Send + Sync {
    /// Container media types handled by this extractor.
    fn media_types(&self) -> &'static [&'static str];

    /// Non-directory entries in natural order. Entries that cannot be
    /// analysed carry the failure in `comment` instead of failing the call.
    fn get_entries(&self, path: &Path, analyze_dimensions: bool) -> Result<Vec<MediaContainerEntry>, ExtractError>;

    fn get_entry_stream(&self, path: &Path, entry_name: &str) -> Result<Vec<u8>, ExtractError>;

    fn get_cover(&self, path: &Path) -> Result<TypedBytes, ExtractError>;
}
