//! EPUB extraction: manifest, navigation, DIVINA projection, entries and cover.

pub mod cover;
pub mod divina;
pub mod manifest;
pub mod nav;
pub mod package;
pub mod xml;

use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};

use crate::archive::Archive;
use crate::config::ExtractOptions;
use crate::detect::{ContentDetector, MagicContentDetector};
use crate::error::ExtractError;
use crate::imaging::{DefaultImageAnalyzer, ImageAnalyzer};
use crate::model::{EpubManifest, TypedBytes};

use self::divina::DivinaProjector;
use self::package::EpubPackage;

const MIMETYPE_ENTRY: &str = "mimetype";
const CONTAINER_ENTRY: &str = "META-INF/container.xml";

/// Reads EPUB publications. Every operation opens the file, works on its own
/// archive handle and closes it before returning.
#[derive(Clone)]
pub struct EpubExtractor {
    detector: Arc<dyn ContentDetector>,
    analyzer: Arc<dyn ImageAnalyzer>,
    options: ExtractOptions,
}

impl Default for EpubExtractor {
    fn default() -> Self {
        Self::new(
            Arc::new(MagicContentDetector),
            Arc::new(DefaultImageAnalyzer),
            ExtractOptions::default(),
        )
    }
}

impl EpubExtractor {
    pub fn new(
        detector: Arc<dyn ContentDetector>,
        analyzer: Arc<dyn ImageAnalyzer>,
        options: ExtractOptions,
    ) -> Self {
        Self {
            detector,
            analyzer,
            options,
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Build the manifest of the EPUB at `path`. Only structural problems
    /// (unreadable container, missing package document, manifest or spine)
    /// fail the call; per-resource problems degrade the result.
    pub fn get_manifest(&self, path: &Path, analyze_dimensions: bool) -> Result<EpubManifest, ExtractError> {
        let mut package = EpubPackage::open(path, &self.options.security)?;
        Ok(self.manifest_for_package(&mut package, analyze_dimensions))
    }

    /// Manifest of an already opened package.
    pub fn manifest_for_package<R: Read + Seek>(
        &self,
        package: &mut EpubPackage<R>,
        analyze_dimensions: bool,
    ) -> EpubManifest {
        let projector = DivinaProjector {
            detector: self.detector.as_ref(),
            analyzer: self.analyzer.as_ref(),
            letter_count_threshold: self.options.divina_letter_count_threshold,
        };
        manifest::build_manifest(package, &projector, analyze_dimensions)
    }

    /// Raw bytes of one entry, retrying with the percent-decoded name.
    pub fn get_entry_stream(&self, path: &Path, entry_name: &str) -> Result<Vec<u8>, ExtractError> {
        Archive::open(path, &self.options.security)?.read_by_name(entry_name)
    }

    /// Whether `path` is a ZIP container carrying the EPUB markers.
    pub fn is_epub(&self, path: &Path) -> bool {
        match Archive::open(path, &self.options.security) {
            Ok(archive) => {
                archive.find_entry(MIMETYPE_ENTRY).is_some() || archive.find_entry(CONTAINER_ENTRY).is_some()
            }
            Err(e) => {
                tracing::debug!("{} is not an EPUB: {}", path.display(), e);
                false
            }
        }
    }

    /// The declared cover if usable, else an image found in the archive,
    /// else a generated placeholder.
    pub fn get_cover(&self, path: &Path) -> Result<TypedBytes, ExtractError> {
        let mut package = EpubPackage::open(path, &self.options.security)?;
        if let Some(cover) = cover::declared_cover(&mut package, self.detector.as_ref()) {
            return Ok(cover);
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        cover::fallback_cover(&mut package.archive, &file_name, self.detector.as_ref())
    }
}

/// Elements of `document` matching `css`, in document order.
pub(crate) fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(e) => {
            tracing::warn!("Invalid selector '{}': {}", css, e);
            Vec::new()
        }
    }
}
