//! EPUB package loading: container.xml → OPF → manifest.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use crate::archive::Archive;
use crate::epub::xml::{parse_xml, XmlElement};
use crate::error::{ArchiveReadError, ExtractError};
use crate::href::{normalize_href, parent_dir};
use crate::model::ManifestItem;
use crate::security::SecurityLimits;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Manifest items keyed by id, iterable in document order.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    items: Vec<ManifestItem>,
    index: HashMap<String, usize>,
}

impl Manifest {
    fn from_items(parsed: Vec<ManifestItem>) -> Self {
        let mut items = Vec::with_capacity(parsed.len());
        let mut index = HashMap::new();
        for item in parsed {
            if index.contains_key(&item.id) {
                tracing::warn!("Duplicate manifest id '{}', keeping the first", item.id);
                continue;
            }
            index.insert(item.id.clone(), items.len());
            items.push(item);
        }
        Self { items, index }
    }

    pub fn get(&self, id: &str) -> Option<&ManifestItem> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An opened EPUB: the archive, its parsed package document and manifest.
/// Scoped to a single extraction call; dropping it closes the archive.
pub struct EpubPackage<R: Read + Seek> {
    pub archive: Archive<R>,
    pub opf: XmlElement,
    pub opf_path: String,
    /// Directory of the package document, base for manifest hrefs.
    pub opf_dir: String,
    pub manifest: Manifest,
}

impl EpubPackage<BufReader<File>> {
    pub fn open(path: &Path, limits: &SecurityLimits) -> Result<Self, ExtractError> {
        Self::from_archive(Archive::open(path, limits)?)
    }
}

impl<R: Read + Seek> EpubPackage<R> {
    pub fn from_archive(mut archive: Archive<R>) -> Result<Self, ExtractError> {
        let opf_path = find_opf_path(&mut archive)?;
        let opf_dir = parent_dir(&opf_path).to_string();

        let opf_content = archive.read_string(&opf_path).map_err(|e| match e {
            ExtractError::EntryNotFound { name } => ExtractError::from(
                ArchiveReadError::MissingContent(format!("Package document not found: {name}")),
            ),
            other => other,
        })?;
        let opf = parse_xml(&opf_content).map_err(|detail| ArchiveReadError::MalformedFile {
            detail: format!("Failed to parse OPF {opf_path}: {detail}"),
        })?;

        let manifest_el = opf
            .child("manifest")
            .ok_or_else(|| ArchiveReadError::MissingContent("No manifest in package document".into()))?;
        if opf.child("spine").is_none() {
            return Err(ArchiveReadError::MissingContent("No spine in package document".into()).into());
        }

        let manifest = Manifest::from_items(manifest_el.children_named("item").filter_map(parse_item).collect());

        Ok(Self {
            archive,
            opf,
            opf_path,
            opf_dir,
            manifest,
        })
    }

    pub fn metadata(&self) -> Option<&XmlElement> {
        self.opf.child("metadata")
    }

    /// Manifest items referenced by the spine, in reading order. Unresolved
    /// idrefs are dropped.
    pub fn spine(&self) -> Vec<&ManifestItem> {
        self.opf
            .child("spine")
            .into_iter()
            .flat_map(|spine| spine.children_named("itemref"))
            .filter_map(|itemref| itemref.attr("idref"))
            .filter_map(|idref| self.manifest.get(idref))
            .collect()
    }

    /// Canonical archive paths of the spine items.
    pub fn spine_paths(&self) -> Vec<String> {
        self.spine().iter().map(|item| self.resolve_href(&item.href)).collect()
    }

    /// Canonical archive path of an href relative to the package document.
    pub fn resolve_href(&self, href: &str) -> String {
        normalize_href(&self.opf_dir, href)
    }

    /// Manifest item whose href resolves to `path`.
    pub fn item_for_path(&self, path: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| self.resolve_href(&item.href) == path)
    }

    /// Bytes of a resource given its canonical path, with the encoded/decoded
    /// entry-name fallbacks of the archive.
    pub fn read_resource(&mut self, path: &str) -> Result<Vec<u8>, ExtractError> {
        match self.archive.find_entry_for_path(path) {
            Some(index) => self.archive.read_entry(index),
            None => self.archive.read_by_name(path),
        }
    }

    pub fn read_resource_string(&mut self, path: &str) -> Result<String, ExtractError> {
        let bytes = self.read_resource(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn parse_item(item: &XmlElement) -> Option<ManifestItem> {
    let id = item.attr("id")?;
    let Some(href) = item.attr("href") else {
        tracing::warn!("Manifest item '{}' has no href, ignoring", id);
        return None;
    };
    let properties: BTreeSet<String> = item
        .attr("properties")
        .map(|p| p.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    Some(ManifestItem {
        id: id.to_string(),
        href: href.to_string(),
        media_type: item.attr("media-type").unwrap_or_default().to_string(),
        properties,
    })
}

fn find_opf_path<R: Read + Seek>(archive: &mut Archive<R>) -> Result<String, ExtractError> {
    let container = archive.read_string(CONTAINER_PATH).map_err(|e| match e {
        ExtractError::EntryNotFound { .. } => ExtractError::from(ArchiveReadError::MissingContent(
            format!("Missing required file: {CONTAINER_PATH}"),
        )),
        other => other,
    })?;

    let mut reader = XmlReader::from_str(&container);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"full-path" {
                        return Ok(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ArchiveReadError::MalformedFile {
                    detail: format!("Failed to parse container.xml: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    Err(ArchiveReadError::MissingContent("No rootfile found in container.xml".into()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

    fn build(files: &[(&str, &str)]) -> Archive<Cursor<Vec<u8>>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        let bytes = zip.finish().unwrap().into_inner();
        Archive::from_reader(Cursor::new(bytes), "test.epub", &SecurityLimits::default()).unwrap()
    }

    #[test]
    fn loads_manifest_and_spine() {
        let opf = r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <manifest>
    <item id="p1" href="Text/p1.xhtml" media-type="application/xhtml+xml"/>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav scripted"/>
    <item id="p2" href="Text/p%202.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine><itemref idref="p2"/><itemref idref="ghost"/><itemref idref="p1"/></spine>
</package>"#;
        let package = EpubPackage::from_archive(build(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", opf),
        ]))
        .unwrap();

        assert_eq!(package.opf_dir, "OEBPS");
        assert_eq!(package.manifest.len(), 3);
        assert!(package.manifest.get("nav").unwrap().has_property("scripted"));
        let ids: Vec<_> = package.spine().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
        assert_eq!(package.spine_paths(), vec!["OEBPS/Text/p 2.xhtml", "OEBPS/Text/p1.xhtml"]);
    }

    #[test]
    fn missing_container_is_archive_read_error() {
        let result = EpubPackage::from_archive(build(&[("mimetype", "application/epub+zip")]));
        assert!(matches!(
            result,
            Err(ExtractError::ArchiveRead(ArchiveReadError::MissingContent(_)))
        ));
    }

    #[test]
    fn missing_opf_is_archive_read_error() {
        let result = EpubPackage::from_archive(build(&[("META-INF/container.xml", CONTAINER)]));
        assert!(matches!(
            result,
            Err(ExtractError::ArchiveRead(ArchiveReadError::MissingContent(_)))
        ));
    }

    #[test]
    fn missing_spine_is_archive_read_error() {
        let result = EpubPackage::from_archive(build(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", "<package><manifest/></package>"),
        ]));
        assert!(matches!(
            result,
            Err(ExtractError::ArchiveRead(ArchiveReadError::MissingContent(ref m))) if m.contains("spine")
        ));
    }
}
