//! Image helpers: dimension analysis, blank-image detection, cover selection
//! and the generated placeholder cover.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use crate::model::{Dimension, TypedBytes};

/// Reads the pixel dimensions of an image.
pub trait ImageAnalyzer: Send + Sync {
    /// `None` when the bytes are not a decodable image.
    fn get_dimension(&self, bytes: &[u8]) -> Option<Dimension>;
}

/// Header-only dimension reader backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultImageAnalyzer;

impl ImageAnalyzer for DefaultImageAnalyzer {
    fn get_dimension(&self, bytes: &[u8]) -> Option<Dimension> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format().ok()?;
        match reader.into_dimensions() {
            Ok((width, height)) => Some(Dimension { width, height }),
            Err(e) => {
                tracing::debug!("Could not read image dimensions: {}", e);
                None
            }
        }
    }
}

/// Picks a cover among the ordered contents of an archive.
pub trait CoverSelector: Send + Sync {
    fn select_proportional(&self, contents: &[Vec<u8>], fallback: &dyn Fn() -> Vec<u8>) -> Vec<u8>;
}

/// Selects the first entry that decodes as a portrait-proportioned image
/// which is not blank; otherwise defers to the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProportionalCoverSelector;

impl CoverSelector for ProportionalCoverSelector {
    fn select_proportional(&self, contents: &[Vec<u8>], fallback: &dyn Fn() -> Vec<u8>) -> Vec<u8> {
        contents
            .iter()
            .find(|bytes| match image::load_from_memory(bytes) {
                Ok(img) => img.height() >= img.width() && !is_mostly_blank(&img),
                Err(_) => false,
            })
            .cloned()
            .unwrap_or_else(fallback)
    }
}

/// Share of pixels that must have the same (quantized) colour for an image
/// to count as blank.
const BLANK_COLOR_SHARE: f64 = 0.95;

/// True when the image is essentially a single colour (white or black pages,
/// placeholder covers).
pub fn is_mostly_blank(img: &DynamicImage) -> bool {
    let sample = if img.width() > 64 || img.height() > 64 {
        img.thumbnail(64, 64).to_rgb8()
    } else {
        img.to_rgb8()
    };
    let total = (sample.width() * sample.height()) as usize;
    if total == 0 {
        return true;
    }

    let mut counts: HashMap<[u8; 3], usize> = HashMap::new();
    for pixel in sample.pixels() {
        let key = [pixel[0] >> 4, pixel[1] >> 4, pixel[2] >> 4];
        *counts.entry(key).or_insert(0) += 1;
    }
    let dominant = counts.values().copied().max().unwrap_or(0);

    dominant as f64 / total as f64 >= BLANK_COLOR_SHARE
}

/// Decode `bytes` and report whether it is a usable (non-blank) picture.
pub fn is_usable_cover(bytes: &[u8]) -> bool {
    match image::load_from_memory(bytes) {
        Ok(img) => !is_mostly_blank(&img),
        Err(_) => false,
    }
}

const COVER_WIDTH: u32 = 2120;
const COVER_HEIGHT: u32 = 3000;
const MAX_TITLE_CHARS: usize = 24;

/// Title shown on a generated cover: the file stem, truncated to 24 chars.
pub fn cover_title(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    if stem.chars().count() > MAX_TITLE_CHARS {
        let head: String = stem.chars().take(MAX_TITLE_CHARS - 2).collect();
        format!("{head}...")
    } else {
        stem.to_string()
    }
}

/// Render a placeholder PNG cover for a book without a usable picture: a
/// white page with a colour band seeded from the title.
pub fn generate_cover(file_name: &str) -> Result<TypedBytes, image::ImageError> {
    let title = cover_title(file_name);
    tracing::info!("Generating placeholder cover for '{}'", title);

    let digest = Sha256::digest(title.as_bytes());
    let band = Rgb([digest[0], digest[1], digest[2]]);

    let band_top = COVER_HEIGHT / 4;
    let band_bottom = band_top + COVER_HEIGHT / 6;
    let page = RgbImage::from_fn(COVER_WIDTH, COVER_HEIGHT, |_, y| {
        if (band_top..band_bottom).contains(&y) {
            band
        } else {
            Rgb([255, 255, 255])
        }
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(page).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(TypedBytes {
        bytes,
        media_type: "image/png".to_string(),
    })
}
