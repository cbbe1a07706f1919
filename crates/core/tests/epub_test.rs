//! End-to-end extraction tests over EPUB files built on the fly.

use std::io::{Cursor, Write};
use std::sync::Arc;

use comicbox_core::config::ExtractOptions;
use comicbox_core::detect::MagicContentDetector;
use comicbox_core::epub::EpubExtractor;
use comicbox_core::error::{ArchiveReadError, ExtractError};
use comicbox_core::imaging::DefaultImageAnalyzer;
use comicbox_core::model::{Dimension, EpubTocEntry, MediaSubType};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

const PRE_PAGINATED: &str = r#"<meta property="rendition:layout">pre-paginated</meta>"#;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        if (x / 10 + y / 10) % 2 == 0 {
            image::Rgb([230, 180, 20])
        } else {
            image::Rgb([10, 60, 140])
        }
    });
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn image_page(src: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Page</title></head>
<body><img src="{src}" alt=""/></body></html>"#
    )
}

/// Builds a one-spine EPUB where each page lives in `OEBPS/Text/` and shows
/// the matching image from `OEBPS/Images/`.
struct EpubBuilder {
    metadata: String,
    manifest: Vec<String>,
    spine: Vec<String>,
    guide: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl EpubBuilder {
    fn new() -> Self {
        Self {
            metadata: String::new(),
            manifest: Vec::new(),
            spine: Vec::new(),
            guide: Vec::new(),
            files: Vec::new(),
        }
    }

    fn metadata(mut self, meta: &str) -> Self {
        self.metadata.push_str(meta);
        self
    }

    fn item(mut self, id: &str, href: &str, media_type: &str, properties: Option<&str>) -> Self {
        let properties = properties.map(|p| format!(r#" properties="{p}""#)).unwrap_or_default();
        self.manifest.push(format!(
            r#"<item id="{id}" href="{href}" media-type="{media_type}"{properties}/>"#
        ));
        self
    }

    fn guide(mut self, kind: &str, title: &str, href: &str) -> Self {
        self.guide.push(format!(
            r#"<reference type="{kind}" title="{title}" href="{href}"/>"#
        ));
        self
    }

    fn file(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.files.push((name.to_string(), content.into()));
        self
    }

    /// Spine page `n` with its image.
    fn image_page(self, n: usize) -> Self {
        self.page_with(n, image_page(&format!("../Images/p{n}.png")))
    }

    /// Spine page without images.
    fn text_page(mut self, id: &str, href: &str, content: String) -> Self {
        self.spine.push(id.to_string());
        self.item(id, href, "application/xhtml+xml", None)
            .file(&format!("OEBPS/{href}"), content)
    }

    fn page_with(mut self, n: usize, content: String) -> Self {
        let page_id = format!("page{n}");
        self.spine.push(page_id.clone());
        self.item(&page_id, &format!("Text/p{n}.xhtml"), "application/xhtml+xml", None)
            .item(&format!("img{n}"), &format!("Images/p{n}.png"), "image/png", None)
            .file(&format!("OEBPS/Text/p{n}.xhtml"), content)
            .file(&format!("OEBPS/Images/p{n}.png"), png(20, 30))
    }

    fn build(self) -> NamedTempFile {
        let spine: String = self
            .spine
            .iter()
            .map(|id| format!(r#"<itemref idref="{id}"/>"#))
            .collect();
        let guide = if self.guide.is_empty() {
            String::new()
        } else {
            format!("<guide>{}</guide>", self.guide.join(""))
        };
        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Test</dc:title>{}</metadata>
  <manifest>{}</manifest>
  <spine>{}</spine>
  {}
</package>"#,
            self.metadata,
            self.manifest.join("\n"),
            spine,
            guide
        );

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut add = |name: &str, data: &[u8]| {
            zip.start_file(name, options).unwrap();
            zip.write_all(data).unwrap();
        };
        add("mimetype", b"application/epub+zip");
        add("META-INF/container.xml", CONTAINER.as_bytes());
        add("OEBPS/content.opf", opf.as_bytes());
        for (name, data) in &self.files {
            add(name, data);
        }
        let bytes = zip.finish().unwrap().into_inner();

        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();
        tmp.flush().unwrap();
        tmp
    }
}

fn comic(pages: usize) -> EpubBuilder {
    (1..=pages).fold(EpubBuilder::new().metadata(PRE_PAGINATED), |b, n| b.image_page(n))
}

#[test]
fn fixed_layout_image_book_projects_to_divina() {
    let epub = comic(3).build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), true).unwrap();

    assert!(manifest.is_fixed_layout);
    assert_eq!(manifest.page_count, 3);
    let files: Vec<_> = manifest.divina_pages.iter().map(|p| p.file_name.as_str()).collect();
    assert_eq!(
        files,
        vec!["OEBPS/Images/p1.png", "OEBPS/Images/p2.png", "OEBPS/Images/p3.png"]
    );
    let page = &manifest.divina_pages[0];
    assert_eq!(page.media_type, "image/png");
    assert_eq!(page.dimension, Some(Dimension { width: 20, height: 30 }));
    assert_eq!(page.file_size, Some(png(20, 30).len() as u64));
}

#[test]
fn divina_skips_dimensions_when_not_requested() {
    let epub = comic(2).build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();
    assert_eq!(manifest.divina_pages.len(), 2);
    assert!(manifest.divina_pages.iter().all(|p| p.dimension.is_none()));
}

#[test]
fn text_heavy_page_disqualifies_divina() {
    let prose = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
<p>This page carries a whole sentence of prose.</p><img src="../Images/p2.png"/></body></html>"#;
    let epub = EpubBuilder::new()
        .metadata(PRE_PAGINATED)
        .image_page(1)
        .page_with(2, prose.to_string())
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), true).unwrap();

    assert!(manifest.is_fixed_layout);
    assert!(manifest.divina_pages.is_empty());
}

#[test]
fn letter_threshold_is_configurable() {
    let caption = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
<p>A caption that is long</p><img src="../Images/p1.png"/></body></html>"#;
    let epub = EpubBuilder::new()
        .metadata(PRE_PAGINATED)
        .page_with(1, caption.to_string())
        .build();

    let strict = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();
    assert!(strict.divina_pages.is_empty());

    let lenient = EpubExtractor::new(
        Arc::new(MagicContentDetector),
        Arc::new(DefaultImageAnalyzer),
        ExtractOptions {
            divina_letter_count_threshold: 100,
            ..Default::default()
        },
    );
    let manifest = lenient.get_manifest(epub.path(), false).unwrap();
    assert_eq!(manifest.divina_pages.len(), 1);
}

#[test]
fn page_with_two_images_breaks_accounting() {
    let two = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
<img src="../Images/p1.png"/><img src="../Images/p2.png"/></body></html>"#;
    let epub = EpubBuilder::new()
        .metadata(PRE_PAGINATED)
        .page_with(1, two.to_string())
        .image_page(2)
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();
    assert_eq!(manifest.page_count, 2);
    assert!(manifest.divina_pages.is_empty());
}

#[test]
fn non_image_media_type_empties_divina() {
    let epub = EpubBuilder::new()
        .metadata(PRE_PAGINATED)
        .image_page(1)
        .text_page("page2", "Text/p2.xhtml", image_page("../Images/p2.png"))
        .item("img2", "Images/p2.png", "application/octet-stream", None)
        .file("OEBPS/Images/p2.png", png(20, 30))
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    assert!(manifest.is_fixed_layout);
    assert_eq!(manifest.page_count, 2);
    assert!(manifest.divina_pages.is_empty());
}

#[test]
fn page_without_image_empties_divina() {
    let epub = EpubBuilder::new()
        .metadata(PRE_PAGINATED)
        .image_page(1)
        .text_page("blank", "Text/blank.xhtml", "<html><body></body></html>".to_string())
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    assert_eq!(manifest.page_count, 2);
    assert!(manifest.divina_pages.is_empty());
}

#[test]
fn image_missing_from_archive_empties_divina() {
    let epub = EpubBuilder::new()
        .metadata(PRE_PAGINATED)
        .image_page(1)
        .text_page("page2", "Text/p2.xhtml", image_page("../Images/p2.png"))
        .item("img2", "Images/p2.png", "image/png", None)
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    assert_eq!(manifest.page_count, 2);
    assert!(manifest.divina_pages.is_empty());
}

#[test]
fn reflowable_book_never_projects_to_divina() {
    let epub = (1..=2).fold(EpubBuilder::new(), |b, n| b.image_page(n)).build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), true).unwrap();

    assert!(!manifest.is_fixed_layout);
    assert!(manifest.divina_pages.is_empty());
}

#[test]
fn legacy_fixed_layout_meta() {
    let epub = EpubBuilder::new()
        .metadata(r#"<meta name="fixed-layout" content="true"/>"#)
        .image_page(1)
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();
    assert!(manifest.is_fixed_layout);
    assert_eq!(manifest.divina_pages.len(), 1);
}

#[test]
fn fixed_layout_positions_are_one_per_page() {
    let epub = comic(4).build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    let positions = &manifest.positions;
    assert_eq!(positions.len(), 4);
    for (i, locator) in positions.iter().enumerate() {
        assert_eq!(locator.href, format!("OEBPS/Text/p{}.xhtml", i + 1));
        assert_eq!(locator.media_type, "application/xhtml+xml");
        assert_eq!(locator.locations.position, i as u32 + 1);
        assert_eq!(locator.locations.progression, 0.0);
        assert_eq!(
            locator.locations.total_progression,
            Some((i as f32 + 1.0) / positions.len() as f32)
        );
    }
}

#[test]
fn reflowable_positions_follow_page_size() {
    let long_page = format!(
        r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p>{}</p></body></html>"#,
        "word ".repeat(500)
    );
    let size = long_page.len() as u64;
    let epub = EpubBuilder::new()
        .text_page("c1", "Text/c1.xhtml", long_page)
        .text_page("c2", "Text/c2.xhtml", "<html><body>short</body></html>".to_string())
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    let chunks = size.div_ceil(1024) as usize;
    let positions = &manifest.positions;
    assert_eq!(positions.len(), chunks + 1);
    assert_eq!(positions[1].locations.progression, 1.0 / chunks as f32);
    assert_eq!(positions[chunks].href, "OEBPS/Text/c2.xhtml");
    assert_eq!(positions.last().unwrap().locations.total_progression, Some(1.0));
}

#[test]
fn resources_are_split_into_present_and_missing() {
    let epub = comic(1)
        .item("css", "Styles/style.css", "text/css", None)
        .file("OEBPS/Styles/style.css", "body {}")
        .item("ghost", "Fonts/missing%20font.otf", "font/otf", None)
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    let pages: Vec<_> = manifest
        .resources
        .iter()
        .filter(|r| r.sub_type == MediaSubType::EpubPage)
        .map(|r| r.file_name.as_str())
        .collect();
    assert_eq!(pages, vec!["OEBPS/Text/p1.xhtml"]);
    assert!(manifest
        .resources
        .iter()
        .any(|r| r.file_name == "OEBPS/Styles/style.css" && r.file_size == Some(7)));

    assert_eq!(manifest.missing_resources.len(), 1);
    let missing = &manifest.missing_resources[0];
    assert_eq!(missing.file_name, "OEBPS/Fonts/missing font.otf");
    assert_eq!(missing.sub_type, MediaSubType::EpubAsset);
    assert_eq!(missing.file_size, None);
}

#[test]
fn percent_encoded_entry_names_still_resolve() {
    let epub = EpubBuilder::new()
        .item("c1", "Text/chapter%201.xhtml", "application/xhtml+xml", None)
        .file("OEBPS/Text/chapter%201.xhtml", "<html><body>x</body></html>")
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();
    assert!(manifest.missing_resources.is_empty());
    assert_eq!(manifest.resources[0].file_name, "OEBPS/Text/chapter 1.xhtml");
}

const NAV: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops"><body>
<nav epub:type="toc"><ol><li><a href="Text/p1.xhtml">Nav Start</a></li></ol></nav>
<nav epub:type="page-list"><ol><li><a href="Text/p1.xhtml">1</a></li></ol></nav>
</body></html>"#;

const NCX: &str = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap><navPoint id="n1"><navLabel><text>Ncx Start</text></navLabel><content src="Text/p1.xhtml"/></navPoint></navMap>
</ncx>"#;

#[test]
fn epub3_navigation_wins_over_ncx() {
    let epub = comic(1)
        .item("nav", "nav.xhtml", "application/xhtml+xml", Some("nav"))
        .file("OEBPS/nav.xhtml", NAV)
        .item("ncx", "toc.ncx", "application/x-dtbncx+xml", None)
        .file("OEBPS/toc.ncx", NCX)
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    assert_eq!(
        manifest.toc,
        vec![EpubTocEntry::new("Nav Start", Some("OEBPS/Text/p1.xhtml".into()))]
    );
    assert_eq!(manifest.page_list.len(), 1);
    assert!(manifest.landmarks.is_empty());
}

#[test]
fn falls_back_to_ncx_without_nav() {
    let epub = comic(1)
        .item("toc", "toc.ncx", "application/x-dtbncx+xml", None)
        .file("OEBPS/toc.ncx", NCX)
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    assert_eq!(
        manifest.toc,
        vec![EpubTocEntry::new("Ncx Start", Some("OEBPS/Text/p1.xhtml".into()))]
    );
    assert!(manifest.page_list.is_empty());
}

#[test]
fn finds_ncx_by_id_when_media_type_is_generic() {
    let epub = comic(1)
        .item("ncx", "toc.ncx", "text/xml", None)
        .file("OEBPS/toc.ncx", NCX)
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    assert_eq!(
        manifest.toc,
        vec![EpubTocEntry::new("Ncx Start", Some("OEBPS/Text/p1.xhtml".into()))]
    );
}

#[test]
fn epub2_guide_becomes_landmarks() {
    let epub = comic(1)
        .item("ncx", "toc.ncx", "application/x-dtbncx+xml", None)
        .file("OEBPS/toc.ncx", NCX)
        .guide("cover", "Cover", "Text/p1.xhtml")
        .guide("text", "Start", "Text/p1.xhtml#top")
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();

    assert_eq!(
        manifest.landmarks,
        vec![
            EpubTocEntry::new("Cover", Some("OEBPS/Text/p1.xhtml".into())),
            EpubTocEntry::new("Start", Some("OEBPS/Text/p1.xhtml#top".into())),
        ]
    );
    assert_eq!(manifest.toc.len(), 1);
}

#[test]
fn guide_is_ignored_when_nav_document_exists() {
    let epub = comic(1)
        .item("nav", "nav.xhtml", "application/xhtml+xml", Some("nav"))
        .file("OEBPS/nav.xhtml", NAV)
        .guide("cover", "Cover", "Text/p1.xhtml")
        .build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();
    assert!(manifest.landmarks.is_empty());
}

#[test]
fn no_navigation_at_all_gives_empty_toc() {
    let epub = comic(1).build();
    let manifest = EpubExtractor::default().get_manifest(epub.path(), false).unwrap();
    assert!(manifest.toc.is_empty());
    assert!(manifest.page_list.is_empty());
    assert!(manifest.landmarks.is_empty());
}

#[test]
fn missing_spine_aborts_manifest() {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("META-INF/container.xml", options).unwrap();
    zip.write_all(CONTAINER.as_bytes()).unwrap();
    zip.start_file("OEBPS/content.opf", options).unwrap();
    zip.write_all(b"<package><manifest/></package>").unwrap();
    let bytes = zip.finish().unwrap().into_inner();
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(&bytes).unwrap();

    let result = EpubExtractor::default().get_manifest(tmp.path(), false);
    assert!(matches!(
        result,
        Err(ExtractError::ArchiveRead(ArchiveReadError::MissingContent(_)))
    ));
}

#[test]
fn entry_stream_retries_decoded_name() {
    let epub = comic(1).file("OEBPS/Misc/read me.txt", "hello").build();
    let bytes = EpubExtractor::default()
        .get_entry_stream(epub.path(), "OEBPS/Misc/read%20me.txt")
        .unwrap();
    assert_eq!(bytes, b"hello");
}

#[test]
fn detects_epub_containers() {
    let extractor = EpubExtractor::default();
    let epub = comic(1).build();
    assert!(extractor.is_epub(epub.path()));

    let mut plain = NamedTempFile::new().unwrap();
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("page1.png", SimpleFileOptions::default()).unwrap();
    zip.write_all(&png(10, 10)).unwrap();
    plain.write_all(&zip.finish().unwrap().into_inner()).unwrap();
    assert!(!extractor.is_epub(plain.path()));

    assert!(!extractor.is_epub(std::path::Path::new("/nonexistent/book.epub")));
}

#[test]
fn declared_cover_image_is_returned() {
    let cover = png(30, 40);
    let epub = comic(1)
        .item("cover", "Images/cover.png", "image/png", Some("cover-image"))
        .file("OEBPS/Images/cover.png", cover.clone())
        .build();
    let typed = EpubExtractor::default().get_cover(epub.path()).unwrap();
    assert_eq!(typed.bytes, cover);
    assert_eq!(typed.media_type, "image/png");
}

#[test]
fn cover_page_is_followed_to_its_image() {
    let cover = png(30, 40);
    let page = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><img src="../Images/front.png"/></body></html>"#;
    let epub = comic(1)
        .item("cover.xhtml", "Text/cover.xhtml", "application/xhtml+xml", None)
        .file("OEBPS/Text/cover.xhtml", page)
        .item("front", "Images/front.png", "image/png", None)
        .file("OEBPS/Images/front.png", cover.clone())
        .build();
    let typed = EpubExtractor::default().get_cover(epub.path()).unwrap();
    assert_eq!(typed.bytes, cover);
}

#[test]
fn cover_falls_back_to_first_image() {
    let epub = comic(2).build();
    let typed = EpubExtractor::default().get_cover(epub.path()).unwrap();
    assert_eq!(typed.bytes, png(20, 30));
    assert_eq!(typed.media_type, "image/png");
}

#[test]
fn cover_is_generated_without_images() {
    let epub = EpubBuilder::new()
        .item("c1", "Text/c1.xhtml", "application/xhtml+xml", None)
        .file("OEBPS/Text/c1.xhtml", "<html><body>text</body></html>")
        .build();
    let typed = EpubExtractor::default().get_cover(epub.path()).unwrap();
    assert_eq!(typed.media_type, "image/png");
    let img = image::load_from_memory(&typed.bytes).unwrap();
    assert_eq!((img.width(), img.height()), (2120, 3000));
}
