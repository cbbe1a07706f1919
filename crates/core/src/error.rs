/// Top-level error type. All public extraction operations return this.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Archive read error: {0}")]
    ArchiveRead(#[from] ArchiveReadError),

    #[error("Entry not found in archive: {name}")]
    EntryNotFound { name: String },

    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub(crate) fn entry_not_found(name: &str) -> Self {
        Self::EntryNotFound {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveReadError {
    #[error("Cannot open {path} as a ZIP archive: {detail}")]
    Open { path: String, detail: String },

    #[error("Missing required content: {0}")]
    MissingContent(String),

    #[error("Malformed package: {detail}")]
    MalformedFile { detail: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("ZIP bomb detected: decompression ratio {ratio}:1 exceeds limit {limit}:1")]
    ZipBomb { ratio: u64, limit: u64 },

    #[error("Archive contains {count} files, exceeding limit of {limit}")]
    TooManyFiles { count: u64, limit: u64 },

    #[error("Resource {name} is {size_mb}MB, exceeding limit of {limit_mb}MB")]
    OversizedResource {
        name: String,
        size_mb: u64,
        limit_mb: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("Could not determine media type: {0}")]
    Unknown(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure while analysing a single archive entry. Never aborts a listing;
/// its message is carried on the entry instead.
#[derive(Debug, thiserror::Error)]
pub enum EntryAnalysisError {
    #[error("Failed to read entry: {0}")]
    Read(String),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ExtractError> for EntryAnalysisError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Security(e) => Self::Security(e),
            ExtractError::Io(e) => Self::Io(e),
            other => Self::Read(other.to_string()),
        }
    }
}
