///
/// In-memory view of a package's `package.zip`.
///
/// Entries are looked up by the relative paths listed in `package.toml`
/// features. Entry bodies are untrusted network input, so reads are capped at
/// `MAX_ENTRY_BYTES` regardless of the size the archive header claims.
///

use std::io::{Cursor, Read};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::errors::PackageError;

pub const MAX_ENTRY_BYTES: u64 = 32 * 1024 * 1024;

pub struct PackageArchive {
    zip: ZipArchive<Cursor<Vec<u8>>>,
}

impl std::fmt::Debug for PackageArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageArchive")
            .field("entries", &self.zip.len())
            .finish()
    }
}

impl PackageArchive {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PackageError> {
        let zip = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self { zip })
    }

    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Reads the entry at `path` in full. `package` only labels errors.
    pub fn read_entry(&mut self, package: &str, path: &str) -> Result<Vec<u8>, PackageError> {
        let name = path.trim_start_matches("./");
        let entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(PackageError::ArchiveEntryMissing {
                    package: package.to_string(),
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let too_large = || PackageError::ArchiveEntryTooLarge {
            package: package.to_string(),
            path: path.to_string(),
            limit: MAX_ENTRY_BYTES,
        };

        if entry.size() > MAX_ENTRY_BYTES {
            return Err(too_large());
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.take(MAX_ENTRY_BYTES + 1).read_to_end(&mut bytes)?;
        if bytes.len() as u64 > MAX_ENTRY_BYTES {
            return Err(too_large());
        }

        Ok(bytes)
    }
}
