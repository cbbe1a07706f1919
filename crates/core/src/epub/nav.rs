//! Navigation parsing: EPUB3 navigation documents, EPUB2 NCX files and the
//! OPF `<guide>`.
//!
//! The navigation source is chosen once per package ([`Navigation::resolve`])
//! and every section is served from it ([`Navigation::entries`]).

use std::io::{Read, Seek};

use scraper::{ElementRef, Html};

use crate::epub::package::EpubPackage;
use crate::epub::select_all;
use crate::epub::xml::{parse_xml, XmlElement};
use crate::href::{normalize_href, parent_dir};
use crate::model::{EpubTocEntry, ManifestItem};

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";
const POSSIBLE_NCX_ITEM_IDS: [&str; 3] = ["toc", "ncx", "ncxtoc"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavSection {
    Toc,
    PageList,
    Landmarks,
}

impl NavSection {
    /// `epub:type` of the matching `<nav>` in an EPUB3 navigation document.
    fn epub3_type(self) -> &'static str {
        match self {
            NavSection::Toc => "toc",
            NavSection::PageList => "page-list",
            NavSection::Landmarks => "landmarks",
        }
    }
}

/// A navigation file read from the archive, with its canonical path.
#[derive(Debug, Clone)]
pub struct ResourceContent {
    pub path: String,
    pub content: String,
}

impl ResourceContent {
    fn dir(&self) -> &str {
        parent_dir(&self.path)
    }
}

#[derive(Debug, Clone)]
pub enum Navigation {
    /// EPUB3 navigation document (manifest item with the `nav` property).
    Epub3(ResourceContent),
    /// EPUB2: optional NCX file plus the landmarks of the OPF guide.
    Epub2 {
        ncx: Option<ResourceContent>,
        guide: Vec<EpubTocEntry>,
    },
}

impl Navigation {
    pub fn resolve<R: Read + Seek>(package: &mut EpubPackage<R>) -> Self {
        if let Some(nav) = find_nav_item(package).and_then(|item| read_item(package, &item)) {
            return Navigation::Epub3(nav);
        }

        let ncx = find_ncx_item(package).and_then(|item| read_item(package, &item));
        let guide = process_opf_guide(&package.opf, &package.opf_dir);
        Navigation::Epub2 { ncx, guide }
    }

    pub fn entries(&self, section: NavSection) -> Vec<EpubTocEntry> {
        match (self, section) {
            (Navigation::Epub3(nav), section) => process_nav(nav, section),
            (Navigation::Epub2 { guide, .. }, NavSection::Landmarks) => guide.clone(),
            (Navigation::Epub2 { ncx: Some(ncx), .. }, section) => process_ncx(ncx, section),
            (Navigation::Epub2 { ncx: None, .. }, _) => Vec::new(),
        }
    }
}

fn find_nav_item<R: Read + Seek>(package: &EpubPackage<R>) -> Option<ManifestItem> {
    package
        .manifest
        .iter()
        .find(|item| item.has_property("nav"))
        .cloned()
}

fn find_ncx_item<R: Read + Seek>(package: &EpubPackage<R>) -> Option<ManifestItem> {
    package
        .manifest
        .iter()
        .find(|item| item.media_type == NCX_MEDIA_TYPE)
        .or_else(|| {
            package
                .manifest
                .iter()
                .find(|item| POSSIBLE_NCX_ITEM_IDS.contains(&item.id.as_str()))
        })
        .cloned()
}

fn read_item<R: Read + Seek>(package: &mut EpubPackage<R>, item: &ManifestItem) -> Option<ResourceContent> {
    let path = package.resolve_href(&item.href);
    match package.read_resource_string(&path) {
        Ok(content) => Some(ResourceContent { path, content }),
        Err(e) => {
            tracing::warn!("Navigation resource '{}' unreadable: {}", path, e);
            None
        }
    }
}

// --- EPUB3 navigation document ---

fn process_nav(document: &ResourceContent, section: NavSection) -> Vec<EpubTocEntry> {
    let html = Html::parse_document(&document.content);
    let wanted = section.epub3_type();

    let selector = format!("nav[epub\\:type~='{wanted}']");
    let Some(nav) = select_all(&html, &selector).into_iter().next() else {
        return Vec::new();
    };

    child_elements(nav, "ol")
        .flat_map(|ol| child_elements(ol, "li"))
        .filter_map(|li| nav_li_to_entry(li, document.dir()))
        .collect()
}

fn nav_li_to_entry(li: ElementRef<'_>, nav_dir: &str) -> Option<EpubTocEntry> {
    let anchor = child_elements(li, "a").next();
    let label = anchor.or_else(|| child_elements(li, "span").next())?;
    let title = collapse_whitespace(&label.text().collect::<String>());

    let href = anchor
        .and_then(|a| a.value().attr("href"))
        .filter(|h| !h.trim().is_empty())
        .map(|h| normalize_href(nav_dir, h));

    let children = child_elements(li, "ol")
        .flat_map(|ol| child_elements(ol, "li"))
        .filter_map(|child| nav_li_to_entry(child, nav_dir))
        .collect();

    Some(EpubTocEntry {
        title: Some(title),
        href,
        children,
    })
}

fn child_elements<'a>(parent: ElementRef<'a>, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.value().name() == name)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// --- EPUB2 NCX ---

fn process_ncx(document: &ResourceContent, section: NavSection) -> Vec<EpubTocEntry> {
    let (container, item) = match section {
        NavSection::Toc => ("navMap", "navPoint"),
        NavSection::PageList => ("pageList", "pageTarget"),
        NavSection::Landmarks => return Vec::new(),
    };

    let ncx = match parse_xml(&document.content) {
        Ok(root) => root,
        Err(e) => {
            tracing::warn!("Failed to parse NCX '{}': {}", document.path, e);
            return Vec::new();
        }
    };

    ncx.children_named(container)
        .flat_map(|c| c.children_named(item))
        .filter_map(|element| ncx_element_to_entry(element, item, document.dir()))
        .collect()
}

/// An element without a label yields nothing, children included.
fn ncx_element_to_entry(element: &XmlElement, item: &str, ncx_dir: &str) -> Option<EpubTocEntry> {
    let title = element.child("navLabel")?.child("text")?.text();
    let href = element
        .child("content")
        .and_then(|c| c.attr("src"))
        .filter(|h| !h.trim().is_empty())
        .map(|h| normalize_href(ncx_dir, h));
    let children = element
        .children_named(item)
        .filter_map(|child| ncx_element_to_entry(child, item, ncx_dir))
        .collect();

    Some(EpubTocEntry {
        title: Some(title),
        href,
        children,
    })
}

// --- EPUB2 guide ---

fn process_opf_guide(opf: &XmlElement, opf_dir: &str) -> Vec<EpubTocEntry> {
    let Some(guide) = opf.child("guide") else {
        return Vec::new();
    };

    guide
        .children_named("reference")
        .map(|reference| EpubTocEntry {
            title: reference.attr("title").map(str::to_string),
            href: reference
                .attr("href")
                .filter(|h| !h.trim().is_empty())
                .map(|h| normalize_href(opf_dir, h)),
            children: Vec::new(),
        })
        .collect()
}
