///
/// # Package Locator
///
/// Turns a dependency descriptor into the base address its `package.toml`,
/// `lesbos.toml` and `package.zip` are served from.
///
/// - `source` dependencies live at `<source>/<version>`
/// - `name` dependencies live wherever the registry template puts
///   `<name>/<version>`, e.g. `https://host/db/-/raw/main/{}` becomes
///   `https://host/db/-/raw/main/strings/1.2.0`
///

use std::fmt;
use std::str::FromStr;

use crate::errors::PackageError;
use crate::manifest::{Dependency, DependencySpec};

pub const DEFAULT_REGISTRY: &str = "https://gitlab.com/goboscript-lesbos/database/-/raw/main/{}";

const PLACEHOLDER: &str = "{}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTemplate(String);

impl RegistryTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, PackageError> {
        let template = template.into();
        if template.matches(PLACEHOLDER).count() != 1 {
            return Err(PackageError::InvalidTemplate { template });
        }
        Ok(Self(template))
    }

    pub fn expand(&self, value: &str) -> String {
        self.0.replacen(PLACEHOLDER, value, 1)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RegistryTemplate {
    fn default() -> Self {
        Self(DEFAULT_REGISTRY.to_string())
    }
}

impl FromStr for RegistryTemplate {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for RegistryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Joins address segments with exactly one `/` between each pair.
///
/// Separators at segment boundaries are collapsed and empty segments are
/// skipped, so `join_address(&[a, b, c]) == join_address(&[&join_address(&[a, b]), c])`.
/// The result never ends in `/`. A leading `/` on the first segment is kept.
pub fn join_address<S: AsRef<str>>(parts: &[S]) -> String {
    let mut out = String::new();

    for part in parts {
        let part = part.as_ref();
        if out.is_empty() {
            out = part.trim_end_matches('/').to_string();
            continue;
        }

        let segment = part.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        out.push('/');
        out.push_str(segment);
    }

    out
}

pub fn resolve_address(dep: &Dependency, template: &RegistryTemplate) -> String {
    match dep {
        Dependency::Source { url, version, .. } => join_address(&[url.as_str(), version.as_str()]),
        Dependency::Named { name, version, .. } => template.expand(&format!("{}/{}", name, version)),
    }
}

pub fn resolve_spec(spec: &DependencySpec, template: &RegistryTemplate) -> Result<String, PackageError> {
    let dep = Dependency::try_from(spec)?;
    Ok(resolve_address(&dep, template))
}
