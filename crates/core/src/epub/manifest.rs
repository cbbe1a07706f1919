//! Assembly of the [`EpubManifest`]: resources, layout, page accounting,
//! positions, navigation and the DIVINA projection.

use std::io::{Read, Seek};

use crate::epub::divina::DivinaProjector;
use crate::epub::nav::{NavSection, Navigation};
use crate::epub::package::EpubPackage;
use crate::href::decode_href;
use crate::model::{EpubManifest, MediaFile, MediaSubType, R2Location, R2Locator, DEFAULT_LOCATOR_TYPE};

/// Bytes per position of a reflowable page, and per estimated print page.
const POSITION_CHUNK_BYTES: u64 = 1024;

pub fn build_manifest<R: Read + Seek>(
    package: &mut EpubPackage<R>,
    projector: &DivinaProjector<'_>,
    analyze_dimensions: bool,
) -> EpubManifest {
    let (resources, missing_resources): (Vec<_>, Vec<_>) =
        get_resources(package).into_iter().partition(|r| r.file_size.is_some());
    if !missing_resources.is_empty() {
        tracing::warn!(
            "{} manifest resource(s) not found in {}",
            missing_resources.len(),
            package.opf_path
        );
    }

    let is_fixed_layout = is_fixed_layout(package);
    let page_count = compute_page_count(package);
    let positions = compute_positions(&resources, is_fixed_layout);

    let navigation = Navigation::resolve(package);

    let divina_pages = if is_fixed_layout {
        projector.project(package, page_count, analyze_dimensions)
    } else {
        Vec::new()
    };

    EpubManifest {
        resources,
        missing_resources,
        toc: navigation.entries(NavSection::Toc),
        landmarks: navigation.entries(NavSection::Landmarks),
        page_list: navigation.entries(NavSection::PageList),
        page_count,
        is_fixed_layout,
        positions,
        divina_pages,
    }
}

/// Spine items as pages followed by every other manifest item as an asset,
/// each sized from its archive entry when present.
pub fn get_resources<R: Read + Seek>(package: &EpubPackage<R>) -> Vec<MediaFile> {
    let spine = package.spine();

    let pages = spine.iter().map(|item| (*item, MediaSubType::EpubPage));
    let assets = package
        .manifest
        .iter()
        .filter(|item| !spine.iter().any(|s| s.id == item.id))
        .map(|item| (item, MediaSubType::EpubAsset));

    pages
        .chain(assets)
        .map(|(item, sub_type)| {
            let file_name = package.resolve_href(&item.href);
            let file_size = package
                .archive
                .find_entry_for_path(&file_name)
                .and_then(|index| package.archive.entry(index))
                .map(|entry| entry.size);
            MediaFile {
                media_type: Some(item.media_type.clone()).filter(|t| !t.is_empty()),
                file_name,
                sub_type,
                file_size,
            }
        })
        .collect()
}

/// `rendition:layout` of `pre-paginated` first, then the legacy
/// `fixed-layout` meta.
pub fn is_fixed_layout<R: Read + Seek>(package: &EpubPackage<R>) -> bool {
    let Some(metadata) = package.metadata() else {
        return false;
    };
    metadata
        .children_named("meta")
        .find(|m| m.attr("property") == Some("rendition:layout"))
        .is_some_and(|m| m.text() == "pre-paginated")
        || metadata
            .children_named("meta")
            .find(|m| m.attr("name") == Some("fixed-layout"))
            .is_some_and(|m| m.attr("content") == Some("true"))
}

/// Estimated print pages: one per started KiB of compressed spine content.
pub fn compute_page_count<R: Read + Seek>(package: &EpubPackage<R>) -> u32 {
    let spine = package.spine_paths();
    package
        .archive
        .entries()
        .iter()
        .filter(|e| !e.is_dir && (spine.contains(&e.name) || spine.iter().any(|p| *p == decode_href(&e.name))))
        .map(|e| e.compressed_size.div_ceil(POSITION_CHUNK_BYTES) as u32)
        .sum()
}

/// Reading positions over the pages of `resources`: one per page for fixed
/// layout, one per started KiB otherwise. Positions are 1-based and global.
pub fn compute_positions(resources: &[MediaFile], is_fixed_layout: bool) -> Vec<R2Locator> {
    let locator = |file: &MediaFile, progression: f32, position: u32| R2Locator {
        href: file.file_name.clone(),
        media_type: file
            .media_type
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCATOR_TYPE.to_string()),
        locations: R2Location {
            progression,
            position,
            total_progression: None,
        },
    };

    let mut next_position = 1u32;
    let mut positions = Vec::new();
    for file in resources.iter().filter(|r| r.sub_type == MediaSubType::EpubPage) {
        if is_fixed_layout {
            positions.push(locator(file, 0.0, next_position));
            next_position += 1;
        } else {
            let count = file.file_size.unwrap_or(0).div_ceil(POSITION_CHUNK_BYTES).max(1) as u32;
            for p in 0..count {
                positions.push(locator(file, p as f32 / count as f32, next_position));
                next_position += 1;
            }
        }
    }

    let total = positions.len() as f32;
    for locator in &mut positions {
        locator.locations.total_progression = Some(locator.locations.position as f32 / total);
    }
    positions
}
