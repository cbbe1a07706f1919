//! Media type detection via magic bytes and content heuristics.

use crate::error::DetectError;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Sniffs the media type of an archive entry from its content.
pub trait ContentDetector: Send + Sync {
    fn detect_media_type(&self, bytes: &[u8]) -> Result<String, DetectError>;

    fn is_image(&self, media_type: &str) -> bool {
        media_type.starts_with("image/")
    }
}

/// Default detector: signature checks on the first bytes of the content,
/// falling back to XML/HTML/text heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicContentDetector;

const HEADER_SIZE: usize = 4096;

impl ContentDetector for MagicContentDetector {
    fn detect_media_type(&self, bytes: &[u8]) -> Result<String, DetectError> {
        let header = &bytes[..bytes.len().min(HEADER_SIZE)];
        let media_type = detect_magic_bytes(header)
            .or_else(|| detect_markup(header))
            .unwrap_or_else(|| {
                if is_likely_text(header) {
                    "text/plain"
                } else {
                    OCTET_STREAM
                }
            });
        Ok(media_type.to_string())
    }
}

/// Check magic bytes against known signatures.
fn detect_magic_bytes(header: &[u8]) -> Option<&'static str> {
    if header.len() < 4 {
        return None;
    }

    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if header.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    // BMP: "BM" followed by the file size and two zeroed reserved words
    if header.len() >= 14 && header.starts_with(b"BM") && header[6..10] == [0, 0, 0, 0] {
        return Some("image/bmp");
    }
    if header.starts_with(b"II*\0") || header.starts_with(b"MM\0*") {
        return Some("image/tiff");
    }
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        return match &header[8..12] {
            b"avif" | b"avis" => Some("image/avif"),
            b"heic" | b"heix" | b"mif1" | b"msf1" => Some("image/heif"),
            _ => None,
        };
    }
    if header.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }
    if header.starts_with(b"PK\x03\x04") {
        return Some("application/zip");
    }
    if header.starts_with(b"Rar!\x1a\x07") {
        return Some("application/x-rar-compressed");
    }

    None
}

/// XML-family content: XHTML, HTML, SVG, plain XML.
fn detect_markup(header: &[u8]) -> Option<&'static str> {
    let text = skip_bom_and_decode(header)?;
    let lower = text.trim_start().to_lowercase();

    if lower.contains("<svg") {
        return Some("image/svg+xml");
    }
    if lower.contains("<html") && lower.contains("http://www.w3.org/1999/xhtml") {
        return Some("application/xhtml+xml");
    }
    if lower.starts_with("<!doctype html") || lower.contains("<html") {
        return Some("text/html");
    }
    if lower.starts_with("<?xml") {
        return Some("application/xml");
    }

    None
}

/// Skip UTF-8 BOM and decode to string for content inspection.
fn skip_bom_and_decode(bytes: &[u8]) -> Option<&str> {
    let bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &bytes[3..]
    } else {
        bytes
    };
    // A header cut in the middle of a multi-byte char is still text.
    match std::str::from_utf8(bytes) {
        Ok(s) => Some(s),
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&bytes[..e.valid_up_to()]).ok(),
        Err(_) => None,
    }
}

/// Check if the byte slice looks like text (no binary control characters).
fn is_likely_text(bytes: &[u8]) -> bool {
    let Some(text) = skip_bom_and_decode(bytes) else {
        return false;
    };
    if text.is_empty() {
        return false;
    }

    let binary_count = text
        .bytes()
        .filter(|&b| b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
        .count();

    // Allow up to 0.1% binary bytes (for the occasional form feed etc.)
    binary_count * 1000 < text.len()
}
