///
/// # Effective Settings
///
/// Merges the `[options]` table of `lesbos.toml` with command-line overrides.
/// A value given on the command line wins over the project file, which wins
/// over the built-in default.
///
/// | option         | default                                  |
/// |----------------|------------------------------------------|
/// | `registry`     | the public goboscript-lesbos database    |
/// | `timeout-secs` | 30                                       |
/// | `compiler`     | `goboscript`                             |
///

use std::time::Duration;

use crate::errors::PackageError;
use crate::locator::RegistryTemplate;
use crate::manifest::Options;
use crate::transport::DEFAULT_TIMEOUT;

pub const DEFAULT_COMPILER: &str = "goboscript";

/// Values supplied on the command line. `None` defers to the project file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub registry: Option<String>,
    pub timeout_secs: Option<u64>,
    pub compiler: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub registry: RegistryTemplate,
    pub timeout: Duration,
    pub compiler: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry: RegistryTemplate::default(),
            timeout: DEFAULT_TIMEOUT,
            compiler: DEFAULT_COMPILER.to_string(),
        }
    }
}

impl Settings {
    pub fn resolve(options: &Options, overrides: &Overrides) -> Result<Self, PackageError> {
        let registry = match overrides.registry.as_ref().or(options.registry.as_ref()) {
            Some(template) => RegistryTemplate::new(template.as_str())?,
            None => RegistryTemplate::default(),
        };

        let timeout = match overrides.timeout_secs.or(options.timeout_secs) {
            Some(0) => {
                return Err(PackageError::InvalidManifest(
                    "timeout-secs must be greater than 0".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        let compiler = overrides
            .compiler
            .clone()
            .or_else(|| options.compiler.clone())
            .unwrap_or_else(|| DEFAULT_COMPILER.to_string());

        Ok(Self {
            registry,
            timeout,
            compiler,
        })
    }
}
