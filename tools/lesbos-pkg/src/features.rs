///
/// # Feature Resolution
///
/// A feature is a named subset of a package's files. Every install starts from
/// the implicit `core` feature and adds whatever features the dependency
/// descriptor asks for.
///
/// A package without `core` still installs (with only the requested features);
/// the caller is told through `FileSelection::MissingCore` so it can warn. A
/// feature that was explicitly requested but does not exist is an error.
///

use indexmap::IndexSet;

use crate::errors::PackageError;
use crate::manifest::{Feature, PackageMetadata};

pub const CORE_FEATURE: &str = "core";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    Complete(IndexSet<String>),
    MissingCore(IndexSet<String>),
}

impl FileSelection {
    pub fn files(&self) -> &IndexSet<String> {
        match self {
            FileSelection::Complete(files) | FileSelection::MissingCore(files) => files,
        }
    }

    pub fn is_missing_core(&self) -> bool {
        matches!(self, FileSelection::MissingCore(_))
    }
}

pub fn resolve_feature<'a>(
    package: &str,
    name: &str,
    features: &'a [Feature],
) -> Result<&'a [String], PackageError> {
    features
        .iter()
        .find(|feature| feature.name == name)
        .map(|feature| feature.files.as_slice())
        .ok_or_else(|| PackageError::FeatureNotFound {
            package: package.to_string(),
            feature: name.to_string(),
        })
}

pub fn collect_files(
    package: &PackageMetadata,
    requested: &[String],
) -> Result<FileSelection, PackageError> {
    let mut files = IndexSet::new();

    let core_found = match resolve_feature(&package.name, CORE_FEATURE, &package.features) {
        Ok(core) => {
            files.extend(core.iter().cloned());
            true
        }
        Err(PackageError::FeatureNotFound { .. }) => false,
        Err(e) => return Err(e),
    };

    for name in requested {
        let feature_files = resolve_feature(&package.name, name, &package.features)?;
        files.extend(feature_files.iter().cloned());
    }

    if core_found {
        Ok(FileSelection::Complete(files))
    } else {
        Ok(FileSelection::MissingCore(files))
    }
}
