///
/// Package manager error types.
///
/// Every failure the installer, the project manager and the packer can hit:
/// malformed dependency descriptors, network transport failures, malformed
/// remote metadata, missing features, unsafe archive entries and local
/// filesystem problems.
///
/// Only `InvalidDependency` is recoverable during a batch install. Everything
/// else aborts the batch it occurs in.
///

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Invalid dependency: {reason}")]
    InvalidDependency { reason: String },

    #[error("Failed to fetch {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Failed to parse {resource} from {url}: {reason}")]
    Parse {
        url: String,
        resource: String,
        reason: String,
    },

    #[error("Could not find feature '{feature}' in package '{package}'")]
    FeatureNotFound { package: String, feature: String },

    #[error("Refusing to install '{path}' from '{package}': path escapes the package directory")]
    PathEscape { package: String, path: String },

    #[error("Archive of '{package}' has no entry '{path}'")]
    ArchiveEntryMissing { package: String, path: String },

    #[error("Archive entry '{path}' of '{package}' exceeds {limit} bytes")]
    ArchiveEntryTooLarge {
        package: String,
        path: String,
        limit: u64,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Could not find lesbos.toml in {path} or any parent directory")]
    ManifestNotFound { path: PathBuf },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("{path} already exists. Try passing --force-remake")]
    ProjectExists { path: PathBuf },

    #[error("{path} is not a library (package.toml is missing)")]
    NotALibrary { path: PathBuf },

    #[error("Invalid registry template '{template}': expected exactly one '{{}}' placeholder")]
    InvalidTemplate { template: String },

    #[error("`{command}` exited with {status}")]
    BuildFailed { command: String, status: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

impl PackageError {
    pub fn is_transport(&self) -> bool {
        matches!(self, PackageError::Transport { .. } | PackageError::Timeout { .. })
    }

    pub fn invalid_dependency(reason: impl Into<String>) -> Self {
        PackageError::InvalidDependency {
            reason: reason.into(),
        }
    }
}
