use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One `<item>` of the OPF manifest. `href` is kept exactly as written in the
/// package document (relative to the OPF directory, possibly percent-encoded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: BTreeSet<String>,
}

impl ManifestItem {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties.contains(property)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaSubType {
    EpubPage,
    EpubAsset,
}

/// A resource of an EPUB publication, resolved to its path inside the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub file_name: String,
    pub media_type: Option<String>,
    pub sub_type: MediaSubType,
    /// `None` when the manifest references a file the archive does not contain.
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpubTocEntry {
    pub title: Option<String>,
    pub href: Option<String>,
    pub children: Vec<EpubTocEntry>,
}

impl EpubTocEntry {
    pub fn new(title: impl Into<String>, href: Option<String>) -> Self {
        Self {
            title: Some(title.into()),
            href,
            children: Vec::new(),
        }
    }
}

pub const DEFAULT_LOCATOR_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R2Locator {
    pub href: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub locations: R2Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R2Location {
    pub progression: f32,
    pub position: u32,
    pub total_progression: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

/// An image page of a publication read as a comic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPage {
    pub file_name: String,
    pub media_type: String,
    pub dimension: Option<Dimension>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpubManifest {
    pub resources: Vec<MediaFile>,
    pub missing_resources: Vec<MediaFile>,
    pub toc: Vec<EpubTocEntry>,
    pub landmarks: Vec<EpubTocEntry>,
    pub page_list: Vec<EpubTocEntry>,
    pub page_count: u32,
    pub is_fixed_layout: bool,
    pub positions: Vec<R2Locator>,
    pub divina_pages: Vec<BookPage>,
}

/// An entry of a plain comic archive. When analysis fails, `comment` carries
/// the reason and the media type and dimension stay unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContainerEntry {
    pub name: String,
    pub media_type: Option<String>,
    pub dimension: Option<Dimension>,
    pub file_size: Option<u64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedBytes {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_uses_r2_field_names() {
        let locator = R2Locator {
            href: "OEBPS/p1.xhtml".into(),
            media_type: "application/xhtml+xml".into(),
            locations: R2Location {
                progression: 0.5,
                position: 2,
                total_progression: Some(1.0),
            },
        };
        let json = serde_json::to_value(&locator).unwrap();
        assert_eq!(json["type"], "application/xhtml+xml");
        assert_eq!(json["locations"]["position"], 2);
        assert_eq!(json["locations"]["totalProgression"], 1.0);
    }

    #[test]
    fn sub_types_serialize_screaming() {
        assert_eq!(serde_json::to_string(&MediaSubType::EpubPage).unwrap(), "\"EPUB_PAGE\"");
        assert_eq!(serde_json::to_string(&MediaSubType::EpubAsset).unwrap(), "\"EPUB_ASSET\"");
    }

    #[test]
    fn manifest_fields_share_the_locator_casing() {
        let manifest = EpubManifest {
            resources: vec![MediaFile {
                file_name: "OEBPS/p1.xhtml".into(),
                media_type: Some("application/xhtml+xml".into()),
                sub_type: MediaSubType::EpubPage,
                file_size: Some(10),
            }],
            missing_resources: Vec::new(),
            toc: Vec::new(),
            landmarks: Vec::new(),
            page_list: Vec::new(),
            page_count: 1,
            is_fixed_layout: false,
            positions: Vec::new(),
            divina_pages: Vec::new(),
        };
        let json = serde_json::to_value(&manifest).unwrap();
        for key in ["missingResources", "pageList", "pageCount", "isFixedLayout", "divinaPages"] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["resources"][0]["fileName"], "OEBPS/p1.xhtml");
        assert_eq!(json["resources"][0]["subType"], "EPUB_PAGE");
        assert_eq!(json["resources"][0]["fileSize"], 10);
    }
}
