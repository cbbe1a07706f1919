//! ZIP container access shared by the EPUB and plain-archive extractors.
//!
//! An [`Archive`] owns its open file handle; dropping it closes the archive, so
//! every public operation opens its own instance and releases it on return,
//! error or not. Instances are never shared between calls.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{ArchiveReadError, ExtractError};
use crate::href::{decode_href, normalize_path};
use crate::security::SecurityLimits;

/// Metadata of one archive entry, captured once when the archive is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntryInfo {
    pub name: String,
    /// Uncompressed size. The central directory always records it.
    pub size: u64,
    pub compressed_size: u64,
    pub is_dir: bool,
}

pub struct Archive<R: Read + Seek> {
    zip: ZipArchive<R>,
    entries: Vec<ArchiveEntryInfo>,
    limits: SecurityLimits,
}

impl Archive<BufReader<File>> {
    /// Open the archive at `path`.
    pub fn open(path: &Path, limits: &SecurityLimits) -> Result<Self, ExtractError> {
        let file = File::open(path).map_err(|e| ArchiveReadError::Open {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_reader(BufReader::new(file), &path.display().to_string(), limits)
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Open an archive from any seekable byte source. `label` names the source in errors.
    pub fn from_reader(reader: R, label: &str, limits: &SecurityLimits) -> Result<Self, ExtractError> {
        let mut zip = ZipArchive::new(reader).map_err(|e| ArchiveReadError::Open {
            path: label.to_string(),
            detail: e.to_string(),
        })?;

        limits.check_entry_count(zip.len() as u64)?;

        let mut entries = Vec::with_capacity(zip.len());
        for idx in 0..zip.len() {
            let file = zip.by_index_raw(idx).map_err(|e| zip_error(label, e))?;
            entries.push(ArchiveEntryInfo {
                name: file.name().to_string(),
                size: file.size(),
                compressed_size: file.compressed_size(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self {
            zip,
            entries,
            limits: limits.clone(),
        })
    }

    /// All entries in central-directory order, directories included.
    pub fn entries(&self) -> &[ArchiveEntryInfo] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&ArchiveEntryInfo> {
        self.entries.get(index)
    }

    /// Exact-name lookup.
    pub fn find_entry(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Two-step lookup: the literal name first, then its percent-decoded form.
    pub fn resolve_entry(&self, name: &str) -> Option<usize> {
        self.find_entry(name).or_else(|| {
            let decoded = decode_href(name);
            if decoded != name {
                tracing::debug!("Entry '{}' not found, retrying as '{}'", name, decoded);
                self.find_entry(&decoded)
            } else {
                None
            }
        })
    }

    /// Lookup for a canonical (already decoded) path against entries whose
    /// stored names may be percent-encoded or written with `./` and backslashes.
    pub fn find_entry_for_path(&self, path: &str) -> Option<usize> {
        self.entries.iter().position(|e| {
            !e.is_dir
                && (e.name == path
                    || normalize_path(&e.name) == path
                    || normalize_path(&decode_href(&e.name)) == path)
        })
    }

    /// Read an entry's bytes, enforcing the resource limits.
    pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>, ExtractError> {
        let info = self
            .entries
            .get(index)
            .ok_or_else(|| ExtractError::entry_not_found(&format!("#{index}")))?;

        self.limits.check_entry(&info.name, info.size, info.compressed_size)?;

        let name = info.name.clone();
        let capacity = info.size as usize;
        let mut file = self.zip.by_index(index).map_err(|e| zip_error(&name, e))?;
        let mut buf = Vec::with_capacity(capacity);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read a named entry with the two-step lookup of [`Archive::resolve_entry`].
    pub fn read_by_name(&mut self, name: &str) -> Result<Vec<u8>, ExtractError> {
        let index = self
            .resolve_entry(name)
            .ok_or_else(|| ExtractError::entry_not_found(name))?;
        self.read_entry(index)
    }

    pub fn read_string(&mut self, name: &str) -> Result<String, ExtractError> {
        let bytes = self.read_by_name(name)?;
        String::from_utf8(bytes).map_err(|e| {
            ArchiveReadError::MalformedFile {
                detail: format!("Invalid UTF-8 in {name}: {e}"),
            }
            .into()
        })
    }
}

fn zip_error(name: &str, err: ZipError) -> ExtractError {
    match err {
        ZipError::Io(e) => ExtractError::Io(e),
        ZipError::FileNotFound => ExtractError::entry_not_found(name),
        other => ArchiveReadError::MalformedFile {
            detail: format!("{name}: {other}"),
        }
        .into(),
    }
}
