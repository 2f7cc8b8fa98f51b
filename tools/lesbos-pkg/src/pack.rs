///
/// Bundles a library project for publishing.
///
/// Produces `lesbos/packed/package.zip` plus copies of `lesbos.toml` and
/// `package.toml` next to it, which together are the three resources a
/// registry serves for one package version. The `lesbos/` working directory
/// itself is never packed.
///

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::cache::{is_library, packed_dir, PACKAGE_ARCHIVE, PACKAGE_MANIFEST, PROJECT_MANIFEST, WORK_DIR};
use crate::errors::PackageError;

const SOURCE_SUFFIX: &str = ".gs";
const ALLOWED_FULL_NAMES: [&str; 2] = [PROJECT_MANIFEST, PACKAGE_MANIFEST];
const ALLOWED_PREFIXES: [&str; 3] = ["README", "DOCS/", "LICENSE"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOutput {
    pub archive: PathBuf,
    pub entries: Vec<String>,
}

pub fn should_pack(relative: &str) -> bool {
    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    file_name.ends_with(SOURCE_SUFFIX)
        || ALLOWED_FULL_NAMES.contains(&relative)
        || ALLOWED_PREFIXES.iter().any(|prefix| relative.starts_with(prefix))
}

pub fn pack_project(root: &Path) -> Result<PackOutput, PackageError> {
    if !is_library(root) {
        return Err(PackageError::NotALibrary {
            path: root.to_path_buf(),
        });
    }

    let out_dir = packed_dir(root);
    if out_dir.exists() {
        std::fs::remove_dir_all(&out_dir)?;
    }
    std::fs::create_dir_all(&out_dir)?;

    let archive = out_dir.join(PACKAGE_ARCHIVE);
    let mut writer = ZipWriter::new(File::create(&archive)?);
    let mut entries = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_work_dir(entry));

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !should_pack(&name) {
            continue;
        }

        debug!(entry = %name, "packing");
        writer.start_file(name.as_str(), entry_options())?;
        let mut source = File::open(entry.path())?;
        std::io::copy(&mut source, &mut writer)?;
        entries.push(name);
    }
    writer.finish()?;

    for manifest in ALLOWED_FULL_NAMES {
        std::fs::copy(root.join(manifest), out_dir.join(manifest))?;
    }

    Ok(PackOutput { archive, entries })
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

fn is_work_dir(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_type().is_dir() && entry.file_name() == WORK_DIR
}
