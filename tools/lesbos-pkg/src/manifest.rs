///
/// # Manifest Parsing
///
/// Types and functions for the two TOML files every lesbos package carries:
///
/// - `lesbos.toml`: project options and declared dependencies. Present in every
///   project, and shipped inside every published package so the installer can
///   discover transitive dependencies.
/// - `package.toml`: library metadata (name, version and features). Only
///   libraries have one.
///
/// ## Dependency descriptors
///
/// A dependency is located either by an explicit `source` URL or by a `name`
/// resolved against the registry template. Exactly one of the two must be
/// present, together with a `version`:
///
/// ```toml
/// deps = [
///     { name = "strings", version = "1.2.0" },
///     { source = "https://example.com/pkgs/maths", version = "0.3.0", features = ["trig"] },
/// ]
///
/// [options]
/// registry = "https://example.com/registry/{}"
/// ```
///
/// Descriptors are deserialized as loose `DependencySpec` tables and only
/// validated when converted into a `Dependency`, so a single malformed entry can
/// be reported and skipped without rejecting the whole file.
///

use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::errors::PackageError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub deps: Vec<DependencySpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Options {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DependencySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Source {
        url: String,
        version: String,
        features: Vec<String>,
    },
    Named {
        name: String,
        version: String,
        features: Vec<String>,
    },
}

impl Dependency {
    pub fn version(&self) -> &str {
        match self {
            Dependency::Source { version, .. } | Dependency::Named { version, .. } => version,
        }
    }

    pub fn features(&self) -> &[String] {
        match self {
            Dependency::Source { features, .. } | Dependency::Named { features, .. } => features,
        }
    }

    /// The URL or registry name this dependency was declared with.
    pub fn identity(&self) -> &str {
        match self {
            Dependency::Source { url, .. } => url,
            Dependency::Named { name, .. } => name,
        }
    }
}

impl TryFrom<&DependencySpec> for Dependency {
    type Error = PackageError;

    fn try_from(spec: &DependencySpec) -> Result<Self, Self::Error> {
        let source = spec.source.as_deref().filter(|s| !s.is_empty());
        let name = spec.name.as_deref().filter(|n| !n.is_empty());

        let identity = match (source, name) {
            (Some(url), Some(name)) => {
                return Err(PackageError::invalid_dependency(format!(
                    "dependency specifies both 'source' ({}) and 'name' ({}); entry dropped, nothing installed for it",
                    url, name
                )))
            }
            (None, None) => {
                return Err(PackageError::invalid_dependency(
                    "dependency must specify either 'source' or 'name'",
                ))
            }
            (Some(url), None) => url,
            (None, Some(name)) => name,
        };

        let version = spec
            .version
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                PackageError::invalid_dependency(format!(
                    "dependency '{}' has no version",
                    identity
                ))
            })?
            .to_string();
        let features = spec.features.clone();

        if source.is_some() {
            Ok(Dependency::Source {
                url: identity.to_string(),
                version,
                features,
            })
        } else {
            Ok(Dependency::Named {
                name: identity.to_string(),
                version,
                features,
            })
        }
    }
}

impl From<&Dependency> for DependencySpec {
    fn from(dep: &Dependency) -> Self {
        match dep {
            Dependency::Source {
                url,
                version,
                features,
            } => DependencySpec {
                source: Some(url.clone()),
                name: None,
                version: Some(version.clone()),
                features: features.clone(),
            },
            Dependency::Named {
                name,
                version,
                features,
            } => DependencySpec {
                source: None,
                name: Some(name.clone()),
                version: Some(version.clone()),
                features: features.clone(),
            },
        }
    }
}

pub fn parse_project(path: &Path) -> Result<ProjectMetadata, PackageError> {
    if !path.is_file() {
        return Err(PackageError::ManifestNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_project_str(&content)
}

pub fn parse_project_str(content: &str) -> Result<ProjectMetadata, PackageError> {
    toml::from_str(content).map_err(|e| PackageError::InvalidManifest(e.to_string()))
}

pub fn parse_package(path: &Path) -> Result<PackageMetadata, PackageError> {
    let content = std::fs::read_to_string(path)?;
    parse_package_str(&content)
}

pub fn parse_package_str(content: &str) -> Result<PackageMetadata, PackageError> {
    toml::from_str(content).map_err(|e| PackageError::InvalidManifest(e.to_string()))
}

pub fn default_project_manifest() -> String {
    r#"deps = []

[options]
"#
    .to_string()
}

pub fn default_package_manifest(name: &str) -> Result<String, PackageError> {
    let package = PackageMetadata {
        name: name.to_string(),
        version: "0.1.0".to_string(),
        features: vec![Feature {
            name: "core".to_string(),
            files: vec!["main.gs".to_string()],
        }],
    };
    Ok(toml::to_string(&package)?)
}

/// Appends `dep` to the `deps` array of the `lesbos.toml` at `path`.
///
/// The file is edited as a generic TOML table so options and keys this crate
/// does not know about survive the rewrite.
pub fn append_dependency(path: &Path, dep: &Dependency) -> Result<(), PackageError> {
    if !path.is_file() {
        return Err(PackageError::ManifestNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let mut table: toml::Table = content.parse()?;

    let entry = toml::Value::try_from(DependencySpec::from(dep))?;
    match table
        .entry("deps")
        .or_insert_with(|| toml::Value::Array(Vec::new()))
    {
        toml::Value::Array(deps) => deps.push(entry),
        _ => {
            return Err(PackageError::InvalidManifest(
                "'deps' must be an array".to_string(),
            ))
        }
    }

    std::fs::write(path, toml::to_string(&table)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_project_with_dependencies() {
        let toml_content = r#"
deps = [
    { name = "strings", version = "1.2.0" },
    { source = "https://example.com/pkgs/maths", version = "0.3.0", features = ["trig", "stats"] },
]

[options]
registry = "https://example.com/registry/{}"
timeout-secs = 10
"#;

        let project = parse_project_str(toml_content).expect("Failed to parse lesbos.toml");

        assert_eq!(project.deps.len(), 2);
        assert_eq!(
            project.options.registry.as_deref(),
            Some("https://example.com/registry/{}")
        );
        assert_eq!(project.options.timeout_secs, Some(10));
        assert_eq!(project.options.compiler, None);

        let maths = Dependency::try_from(&project.deps[1]).unwrap();
        assert_eq!(
            maths,
            Dependency::Source {
                url: "https://example.com/pkgs/maths".to_string(),
                version: "0.3.0".to_string(),
                features: vec!["trig".to_string(), "stats".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_project_without_deps_or_options() {
        let project = parse_project_str("").expect("Empty lesbos.toml should parse");
        assert!(project.deps.is_empty());
        assert_eq!(project.options, Options::default());
    }

    #[test]
    fn test_empty_dependency_table_parses_but_is_invalid() {
        let project = parse_project_str("deps = [{}]\n").unwrap();
        assert_eq!(project.deps.len(), 1);

        match Dependency::try_from(&project.deps[0]) {
            Err(PackageError::InvalidDependency { reason }) => {
                assert!(reason.contains("either 'source' or 'name'"));
            }
            other => panic!("Expected InvalidDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_dependency_with_neither_source_nor_name() {
        let spec = DependencySpec {
            version: Some("1.0.0".to_string()),
            ..Default::default()
        };
        match Dependency::try_from(&spec) {
            Err(PackageError::InvalidDependency { reason }) => {
                assert!(reason.contains("either 'source' or 'name'"));
            }
            other => panic!("Expected InvalidDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_dependency_with_both_source_and_name() {
        let spec = DependencySpec {
            source: Some("https://example.com/foo".to_string()),
            name: Some("foo".to_string()),
            version: Some("1.0.0".to_string()),
            features: Vec::new(),
        };
        match Dependency::try_from(&spec) {
            Err(PackageError::InvalidDependency { reason }) => {
                assert!(reason.contains("both"));
                assert!(reason.contains("https://example.com/foo"));
                assert!(reason.contains("entry dropped"));
            }
            other => panic!("Expected InvalidDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_dependency_without_version() {
        let spec = DependencySpec {
            name: Some("foo".to_string()),
            ..Default::default()
        };
        match Dependency::try_from(&spec) {
            Err(PackageError::InvalidDependency { reason }) => {
                assert!(reason.contains("'foo' has no version"));
            }
            other => panic!("Expected InvalidDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_package_metadata() {
        let toml_content = r#"
name = "foo"
version = "1.0.0"

[[features]]
name = "core"
files = ["main.gs", "util.gs"]

[[features]]
name = "extra"
files = ["extra/more.gs"]
"#;

        let package = parse_package_str(toml_content).unwrap();
        assert_eq!(package.name, "foo");
        assert_eq!(package.version, "1.0.0");
        assert_eq!(package.features.len(), 2);
        assert_eq!(package.features[0].name, "core");
        assert_eq!(package.features[1].files, vec!["extra/more.gs"]);
    }

    #[test]
    fn test_package_metadata_requires_name() {
        let result = parse_package_str("version = \"1.0.0\"\n");
        assert!(matches!(result, Err(PackageError::InvalidManifest(_))));
    }

    #[test]
    fn test_default_manifests_are_valid() {
        let project = parse_project_str(&default_project_manifest()).unwrap();
        assert!(project.deps.is_empty());

        let content = default_package_manifest("my-lib").unwrap();
        let package = parse_package_str(&content).unwrap();
        assert_eq!(package.name, "my-lib");
        assert_eq!(package.version, "0.1.0");
        assert_eq!(package.features[0].name, "core");
        assert_eq!(package.features[0].files, vec!["main.gs"]);
    }

    #[test]
    fn test_append_dependency_preserves_options() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lesbos.toml");
        std::fs::write(
            &path,
            "deps = []\n\n[options]\ncompiler = \"gsc\"\ncustom = true\n",
        )
        .unwrap();

        let dep = Dependency::Named {
            name: "strings".to_string(),
            version: "1.2.0".to_string(),
            features: Vec::new(),
        };
        append_dependency(&path, &dep).unwrap();

        let dep = Dependency::Source {
            url: "https://example.com/maths".to_string(),
            version: "0.3.0".to_string(),
            features: vec!["trig".to_string()],
        };
        append_dependency(&path, &dep).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("custom = true"));

        let project = parse_project_str(&content).unwrap();
        assert_eq!(project.options.compiler.as_deref(), Some("gsc"));
        assert_eq!(project.deps.len(), 2);
        assert_eq!(project.deps[0].name.as_deref(), Some("strings"));
        assert_eq!(project.deps[1].source.as_deref(), Some("https://example.com/maths"));
        assert_eq!(project.deps[1].features, vec!["trig"]);
    }

    #[test]
    fn test_append_dependency_creates_deps_array() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lesbos.toml");
        std::fs::write(&path, "[options]\n").unwrap();

        let dep = Dependency::Named {
            name: "strings".to_string(),
            version: "1.2.0".to_string(),
            features: Vec::new(),
        };
        append_dependency(&path, &dep).unwrap();

        let project = parse_project(&path).unwrap();
        assert_eq!(project.deps.len(), 1);
    }

    #[test]
    fn test_parse_project_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = parse_project(&temp_dir.path().join("lesbos.toml"));
        assert!(matches!(result, Err(PackageError::ManifestNotFound { .. })));
    }
}
