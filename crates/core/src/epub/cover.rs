//! Cover lookup for EPUB publications.

use std::io::{Read, Seek};

use image::DynamicImage;
use scraper::Html;

use crate::archive::Archive;
use crate::detect::{ContentDetector, OCTET_STREAM};
use crate::epub::package::EpubPackage;
use crate::epub::select_all;
use crate::error::ExtractError;
use crate::href::{normalize_href, parent_dir};
use crate::imaging::{generate_cover, is_mostly_blank, is_usable_cover};
use crate::model::{ManifestItem, TypedBytes};

const COVER_PAGE_ID: &str = "cover.xhtml";
const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".png", ".jpeg"];
const COVER_FILE_NAMES: [&str; 3] = ["cover.jpg", "cover.png", "cover.jpeg"];

/// The cover declared by the package: the `cover-image` item (EPUB3), a
/// `cover.xhtml` page, or the item named by `<meta name="cover">` (EPUB2).
/// Blank or undecodable candidates yield `None`.
pub fn declared_cover<R: Read + Seek>(
    package: &mut EpubPackage<R>,
    detector: &dyn ContentDetector,
) -> Option<TypedBytes> {
    let item = find_cover_item(package)?.clone();
    let mut path = package.resolve_href(&item.href);
    let mut media_type = Some(item.media_type.clone()).filter(|t| detector.is_image(t));

    if item.id == COVER_PAGE_ID || item.media_type == "application/xhtml+xml" {
        let page = match package.read_resource_string(&path) {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!("Cover page '{}' unreadable: {}", path, e);
                return None;
            }
        };
        path = normalize_href(parent_dir(&path), &first_image_ref(&page)?);
        media_type = package
            .item_for_path(&path)
            .map(|i| i.media_type.clone())
            .filter(|t| detector.is_image(t));
    }

    let bytes = match package.read_resource(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("Cover image '{}' unreadable: {}", path, e);
            return None;
        }
    };
    if !is_usable_cover(&bytes) {
        tracing::debug!("Declared cover '{}' is blank or not an image", path);
        return None;
    }

    let media_type = media_type.unwrap_or_else(|| detect_or_octet(detector, &bytes));
    Some(TypedBytes { bytes, media_type })
}

fn find_cover_item<R: Read + Seek>(package: &EpubPackage<R>) -> Option<&ManifestItem> {
    package
        .manifest
        .iter()
        .find(|item| item.has_property("cover-image") || item.id == COVER_PAGE_ID)
        .or_else(|| {
            let id = package
                .metadata()?
                .children_named("meta")
                .find(|m| m.attr("name") == Some("cover"))?
                .attr("content")
                .filter(|c| !c.trim().is_empty())?;
            package.manifest.get(id)
        })
}

/// First `<img src>`, else the first `<image href>`, of a cover page.
fn first_image_ref(page: &str) -> Option<String> {
    let document = Html::parse_document(page);

    let src = select_all(&document, "img[src]")
        .iter()
        .find_map(|e| e.value().attr("src"))
        .or_else(|| {
            select_all(&document, "svg image")
                .iter()
                .find_map(|e| e.value().attrs().find(|(k, _)| *k == "href").map(|(_, v)| v))
        })
        .filter(|src| !src.trim().is_empty())
        .map(str::to_string);
    src
}

/// Fallback when the package declares no usable cover: an image entry named
/// like a cover, then the first decodable image, then a generated cover.
pub fn fallback_cover<R: Read + Seek>(
    archive: &mut Archive<R>,
    file_name: &str,
    detector: &dyn ContentDetector,
) -> Result<TypedBytes, ExtractError> {
    let images: Vec<(usize, String)> = archive
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_dir && IMAGE_EXTENSIONS.iter().any(|ext| e.name.to_lowercase().ends_with(ext)))
        .map(|(i, e)| (i, e.name.to_lowercase()))
        .collect();

    for (index, _) in images
        .iter()
        .filter(|(_, name)| COVER_FILE_NAMES.iter().any(|c| name.ends_with(c)))
    {
        if let Some(bytes) = read_usable(archive, *index) {
            let media_type = detect_or_octet(detector, &bytes);
            return Ok(TypedBytes { bytes, media_type });
        }
    }

    for (index, name) in &images {
        let Ok(bytes) = archive.read_entry(*index) else {
            continue;
        };
        let Some(img) = decode(&bytes) else {
            continue;
        };
        if is_mostly_blank(&img) {
            tracing::debug!("First image '{}' is blank", name);
            break;
        }
        let media_type = detect_or_octet(detector, &bytes);
        return Ok(TypedBytes { bytes, media_type });
    }

    generate_cover(file_name).map_err(|e| ExtractError::Io(std::io::Error::other(e)))
}

fn read_usable<R: Read + Seek>(archive: &mut Archive<R>, index: usize) -> Option<Vec<u8>> {
    archive.read_entry(index).ok().filter(|bytes| is_usable_cover(bytes))
}

fn decode(bytes: &[u8]) -> Option<DynamicImage> {
    image::load_from_memory(bytes).ok()
}

fn detect_or_octet(detector: &dyn ContentDetector, bytes: &[u8]) -> String {
    detector
        .detect_media_type(bytes)
        .unwrap_or_else(|_| OCTET_STREAM.to_string())
}
