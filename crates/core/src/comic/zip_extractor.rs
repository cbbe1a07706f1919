use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

use crate::archive::{Archive, ArchiveEntryInfo};
use crate::comic::DivinaExtractor;
use crate::config::ExtractOptions;
use crate::detect::{ContentDetector, MagicContentDetector, OCTET_STREAM};
use crate::error::{ArchiveReadError, EntryAnalysisError, ExtractError};
use crate::imaging::{CoverSelector, DefaultImageAnalyzer, ImageAnalyzer, ProportionalCoverSelector};
use crate::model::{MediaContainerEntry, TypedBytes};
use crate::sort::{natural_cmp, sort_natural};

const ZIP_MEDIA_TYPES: &[&str] = &["application/zip"];

/// Extractor for ZIP comic archives (CBZ and plain ZIP).
#[derive(Clone)]
pub struct ZipExtractor {
    detector: Arc<dyn ContentDetector>,
    analyzer: Arc<dyn ImageAnalyzer>,
    cover_selector: Arc<dyn CoverSelector>,
    options: ExtractOptions,
}

impl Default for ZipExtractor {
    fn default() -> Self {
        Self::new(
            Arc::new(MagicContentDetector),
            Arc::new(DefaultImageAnalyzer),
            Arc::new(ProportionalCoverSelector),
            ExtractOptions::default(),
        )
    }
}

impl ZipExtractor {
    pub fn new(
        detector: Arc<dyn ContentDetector>,
        analyzer: Arc<dyn ImageAnalyzer>,
        cover_selector: Arc<dyn CoverSelector>,
        options: ExtractOptions,
    ) -> Self {
        Self {
            detector,
            analyzer,
            cover_selector,
            options,
        }
    }

    /// Analyse every non-directory entry of an open archive.
    pub fn entries_from_archive<R: Read + Seek>(
        &self,
        archive: &mut Archive<R>,
        analyze_dimensions: bool,
    ) -> Vec<MediaContainerEntry> {
        let files: Vec<(usize, ArchiveEntryInfo)> = archive
            .entries()
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, e)| !e.is_dir)
            .collect();

        let mut entries: Vec<MediaContainerEntry> = files
            .into_iter()
            .map(|(index, info)| match self.analyze_entry(archive, index, &info, analyze_dimensions) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Could not analyze entry '{}': {}", info.name, e);
                    MediaContainerEntry {
                        name: info.name,
                        comment: Some(e.to_string()),
                        ..Default::default()
                    }
                }
            })
            .collect();

        sort_natural(&mut entries, |e| e.name.as_str());
        entries
    }

    fn analyze_entry<R: Read + Seek>(
        &self,
        archive: &mut Archive<R>,
        index: usize,
        info: &ArchiveEntryInfo,
        analyze_dimensions: bool,
    ) -> Result<MediaContainerEntry, EntryAnalysisError> {
        let bytes = archive.read_entry(index)?;
        let media_type = self.detector.detect_media_type(&bytes)?;
        let dimension = if analyze_dimensions && self.detector.is_image(&media_type) {
            self.analyzer.get_dimension(&bytes)
        } else {
            None
        };

        Ok(MediaContainerEntry {
            name: info.name.clone(),
            media_type: Some(media_type),
            dimension,
            file_size: Some(info.size),
            comment: None,
        })
    }

    /// Contents of every non-directory entry in natural order. Unreadable
    /// entries are returned empty.
    pub fn get_entry_stream_list(&self, path: &Path) -> Result<Vec<Vec<u8>>, ExtractError> {
        let mut archive = Archive::open(path, &self.options.security)?;
        Ok(entry_contents(&mut archive))
    }
}

fn entry_contents<R: Read + Seek>(archive: &mut Archive<R>) -> Vec<Vec<u8>> {
    let mut files: Vec<(usize, String)> = archive
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_dir)
        .map(|(i, e)| (i, e.name.clone()))
        .collect();
    files.sort_by(|a, b| natural_cmp(&a.1, &b.1));

    files
        .into_iter()
        .map(|(index, name)| {
            archive.read_entry(index).unwrap_or_else(|e| {
                tracing::warn!("Could not read entry '{}': {}", name, e);
                Vec::new()
            })
        })
        .collect()
}

impl DivinaExtractor for ZipExtractor {
    fn media_types(&self) -> &'static [&'static str] {
        ZIP_MEDIA_TYPES
    }

    fn get_entries(&self, path: &Path, analyze_dimensions: bool) -> Result<Vec<MediaContainerEntry>, ExtractError> {
        let mut archive = Archive::open(path, &self.options.security)?;
        Ok(self.entries_from_archive(&mut archive, analyze_dimensions))
    }

    fn get_entry_stream(&self, path: &Path, entry_name: &str) -> Result<Vec<u8>, ExtractError> {
        Archive::open(path, &self.options.security)?.read_by_name(entry_name)
    }

    /// The entry picked by the cover selector, the first entry in natural
    /// order when it finds none.
    fn get_cover(&self, path: &Path) -> Result<TypedBytes, ExtractError> {
        let contents = self.get_entry_stream_list(path)?;
        let Some(first) = contents.first() else {
            return Err(ArchiveReadError::MissingContent(format!("{} has no entries", path.display())).into());
        };

        let bytes = self
            .cover_selector
            .select_proportional(&contents, &|| first.clone());
        let media_type = self
            .detector
            .detect_media_type(&bytes)
            .unwrap_or_else(|_| OCTET_STREAM.to_string());
        Ok(TypedBytes { bytes, media_type })
    }
}
