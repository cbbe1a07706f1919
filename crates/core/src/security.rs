//! Limits applied while opening archives and before inflating any entry.

use serde::{Deserialize, Serialize};

use crate::error::SecurityError;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLimits {
    /// Highest uncompressed/compressed ratio accepted for one entry.
    pub max_compression_ratio: u64,
    pub max_file_count: u64,
    /// Largest uncompressed entry, in bytes.
    pub max_resource_size_bytes: u64,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_compression_ratio: 100,
            max_file_count: 10_000,
            max_resource_size_bytes: 200 * MIB,
        }
    }
}

impl SecurityLimits {
    pub fn check_entry_count(&self, count: u64) -> Result<(), SecurityError> {
        if count > self.max_file_count {
            return Err(SecurityError::TooManyFiles {
                count,
                limit: self.max_file_count,
            });
        }
        Ok(())
    }

    /// Validate an entry from its central-directory sizes, before reading it.
    pub fn check_entry(&self, name: &str, size: u64, compressed_size: u64) -> Result<(), SecurityError> {
        if size > self.max_resource_size_bytes {
            return Err(SecurityError::OversizedResource {
                name: name.to_string(),
                size_mb: size / MIB,
                limit_mb: self.max_resource_size_bytes / MIB,
            });
        }

        // Stored empty entries have nothing to inflate.
        let ratio = match compressed_size {
            0 if size == 0 => return Ok(()),
            0 => u64::MAX,
            c => size / c,
        };
        if ratio > self.max_compression_ratio {
            return Err(SecurityError::ZipBomb {
                ratio,
                limit: self.max_compression_ratio,
            });
        }
        Ok(())
    }
}
