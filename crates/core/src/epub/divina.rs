//! Projection of fixed-layout EPUBs onto a DIVINA page list.
//!
//! Only books where every spine page is a single image with (almost) no text
//! qualify; anything else projects to an empty list.

use std::io::{Read, Seek};

use scraper::Html;

use crate::detect::ContentDetector;
use crate::epub::package::EpubPackage;
use crate::epub::select_all;
use crate::href::{normalize_href, parent_dir};
use crate::imaging::ImageAnalyzer;
use crate::model::BookPage;

pub struct DivinaProjector<'a> {
    pub detector: &'a dyn ContentDetector,
    pub analyzer: &'a dyn ImageAnalyzer,
    /// Maximum number of body characters a page may carry.
    pub letter_count_threshold: usize,
}

/// What a single spine page contributes to the projection.
#[derive(Debug, Default, PartialEq, Eq)]
struct PageImages {
    letter_count: usize,
    images: Vec<String>,
}

impl DivinaProjector<'_> {
    pub fn project<R: Read + Seek>(
        &self,
        package: &mut EpubPackage<R>,
        page_count: u32,
        analyze_dimensions: bool,
    ) -> Vec<BookPage> {
        let page_count = page_count as usize;
        let mut pages_with_images = 0;
        let mut image_paths = Vec::new();

        for page_path in package.spine_paths() {
            let content = match package.read_resource_string(&page_path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Error while getting divina pages, '{}' unreadable: {}", page_path, e);
                    return Vec::new();
                }
            };

            let page = scan_page(&content, parent_dir(&page_path));
            if page.letter_count > self.letter_count_threshold {
                tracing::debug!(
                    "Page '{}' has {} letters of text, not a divina candidate",
                    page_path,
                    page.letter_count
                );
                return Vec::new();
            }
            if !page.images.is_empty() {
                pages_with_images += 1;
            }
            image_paths.extend(page.images);
        }

        if pages_with_images != page_count || image_paths.len() != page_count {
            tracing::debug!(
                "Divina page accounting mismatch: {} pages with images, {} images, {} expected",
                pages_with_images,
                image_paths.len(),
                page_count
            );
            return Vec::new();
        }

        let divina_pages: Vec<BookPage> = image_paths
            .iter()
            .filter_map(|path| self.book_page(package, path, analyze_dimensions))
            .collect();

        if divina_pages.len() != page_count {
            return Vec::new();
        }
        divina_pages
    }

    fn book_page<R: Read + Seek>(
        &self,
        package: &mut EpubPackage<R>,
        image_path: &str,
        analyze_dimensions: bool,
    ) -> Option<BookPage> {
        let media_type = package.item_for_path(image_path)?.media_type.clone();
        if !self.detector.is_image(&media_type) {
            return None;
        }

        let Some(index) = package.archive.find_entry_for_path(image_path) else {
            tracing::warn!("Divina image '{}' is not in the archive", image_path);
            return None;
        };
        let file_size = package.archive.entry(index).map(|e| e.size);

        let dimension = if analyze_dimensions {
            match package.read_resource(image_path) {
                Ok(bytes) => self.analyzer.get_dimension(&bytes),
                Err(e) => {
                    tracing::warn!("Could not read divina image '{}': {}", image_path, e);
                    None
                }
            }
        } else {
            None
        };

        Some(BookPage {
            file_name: image_path.to_string(),
            media_type,
            dimension,
            file_size,
        })
    }
}

/// Body text length and image references of an XHTML page, the latter
/// resolved against `page_dir`.
fn scan_page(content: &str, page_dir: &str) -> PageImages {
    let document = Html::parse_document(content);

    let letter_count = select_all(&document, "body")
        .first()
        .map(|body| {
            body.text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .chars()
                .count()
        })
        .unwrap_or(0);

    // xlink:href is stored under its local name.
    let images = select_all(&document, "img[src], svg > image")
        .into_iter()
        .filter_map(|e| match e.value().name() {
            "img" => e.value().attr("src"),
            _ => e.value().attrs().find(|(k, _)| *k == "href").map(|(_, v)| v),
        })
        .map(|src| normalize_href(page_dir, src))
        .collect();

    PageImages { letter_count, images }
}
