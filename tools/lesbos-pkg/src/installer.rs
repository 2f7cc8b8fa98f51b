///
/// # Dependency Installation
///
/// Installs dependency descriptors into an install root and recurses into the
/// dependencies each fetched package declares in its own `lesbos.toml`.
///
/// ## Algorithm
///
/// For each descriptor, in order:
///
/// 1. Validate it. A malformed descriptor is reported as a warning and skipped;
///    this is the only error a batch survives.
/// 2. Fetch `package.toml`, `lesbos.toml` and `package.zip`.
/// 3. Select `core` plus the requested features.
/// 4. Check every selected path stays inside `<root>/<name>/<version>`, then
///    write each file that does not exist yet.
/// 5. Recurse into the package's declared dependencies, using the same
///    registry template and root.
///
/// ## Cycles
///
/// Resolution state keyed by `(name, version)` is threaded through the
/// recursion. Files are always installed, so two dependents asking for
/// different features of one package get the union on disk. Only the descent
/// into a package's own dependencies is skipped when that package was already
/// resolved, or reported as a cycle when it is still on the current path.
///

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, debug_span};

use crate::cache::{contained_path, pack_dir, write_if_missing};
use crate::errors::PackageError;
use crate::features::collect_files;
use crate::fetcher::{fetch_package, FetchedPackage};
use crate::locator::RegistryTemplate;
use crate::manifest::{Dependency, DependencySpec};
use crate::observer::{InstallEvent, InstallObserver, InstallWarning};
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

#[derive(Debug, Default)]
pub struct ResolveState {
    visiting: HashSet<PackageId>,
    path_stack: Vec<PackageId>,
    resolved: HashSet<PackageId>,
}

impl ResolveState {
    pub fn new() -> Self {
        Self::default()
    }

    fn cycle_to(&self, id: &PackageId) -> Vec<String> {
        let start = self
            .path_stack
            .iter()
            .position(|entry| entry == id)
            .unwrap_or(0);
        self.path_stack[start..]
            .iter()
            .chain(std::iter::once(id))
            .map(ToString::to_string)
            .collect()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Packages resolved, in first-resolution order.
    pub packages: Vec<PackageId>,
    pub written: Vec<PathBuf>,
    pub skipped: usize,
    pub invalid: usize,
}

pub struct Installer<'a, T: Transport + ?Sized, O: InstallObserver + ?Sized> {
    transport: &'a T,
    observer: &'a O,
    template: RegistryTemplate,
    root: PathBuf,
}

impl<'a, T: Transport + ?Sized, O: InstallObserver + ?Sized> Installer<'a, T, O> {
    pub fn new(transport: &'a T, observer: &'a O, template: RegistryTemplate, root: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            observer,
            template,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn template(&self) -> &RegistryTemplate {
        &self.template
    }

    pub fn install_many(&self, specs: &[DependencySpec]) -> Result<InstallReport, PackageError> {
        let mut state = ResolveState::new();
        let mut report = InstallReport::default();
        self.install_specs(specs, &mut state, &mut report)?;
        Ok(report)
    }

    pub fn install_one(&self, dep: &Dependency) -> Result<InstallReport, PackageError> {
        let mut state = ResolveState::new();
        let mut report = InstallReport::default();
        self.install_dependency(dep, &mut state, &mut report)?;
        Ok(report)
    }

    pub fn install_specs(
        &self,
        specs: &[DependencySpec],
        state: &mut ResolveState,
        report: &mut InstallReport,
    ) -> Result<(), PackageError> {
        for spec in specs {
            let dep = match Dependency::try_from(spec) {
                Ok(dep) => dep,
                Err(PackageError::InvalidDependency { reason }) => {
                    report.invalid += 1;
                    self.observer
                        .on_event(&InstallEvent::Warning(InstallWarning::InvalidDependency { reason }));
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.install_dependency(&dep, state, report)?;
        }
        Ok(())
    }

    pub fn install_dependency(
        &self,
        dep: &Dependency,
        state: &mut ResolveState,
        report: &mut InstallReport,
    ) -> Result<(), PackageError> {
        let _span = debug_span!("install", dependency = dep.identity(), version = dep.version()).entered();

        let FetchedPackage {
            package,
            project,
            mut archive,
            ..
        } = fetch_package(self.transport, dep, &self.template)?;

        self.observer.on_event(&InstallEvent::Fetching {
            name: package.name.clone(),
            version: package.version.clone(),
        });

        let selection = collect_files(&package, dep.features())?;
        if selection.is_missing_core() {
            self.observer
                .on_event(&InstallEvent::Warning(InstallWarning::MissingCore {
                    package: package.name.clone(),
                }));
        }

        let dir = pack_dir(&self.root, &package.name, &package.version)?;
        let targets = selection
            .files()
            .iter()
            .map(|file| Ok((file.as_str(), contained_path(&dir, &package.name, file)?)))
            .collect::<Result<Vec<_>, PackageError>>()?;

        std::fs::create_dir_all(&dir)?;

        for (file, dest) in targets {
            if dest.exists() {
                debug!(file, "already installed");
                report.skipped += 1;
                continue;
            }

            let bytes = archive.read_entry(&package.name, file)?;
            if write_if_missing(&dest, &bytes)? {
                debug!(file, bytes = bytes.len(), "installed");
                report.written.push(dest);
            } else {
                report.skipped += 1;
            }
        }

        let id = PackageId {
            name: package.name,
            version: package.version,
        };

        if state.visiting.contains(&id) {
            let cycle = state.cycle_to(&id);
            self.observer
                .on_event(&InstallEvent::Warning(InstallWarning::DependencyCycle { cycle }));
            return Ok(());
        }

        if state.resolved.contains(&id) {
            debug!(package = %id, "dependencies already resolved");
            return Ok(());
        }

        if !project.deps.is_empty() {
            self.observer.on_event(&InstallEvent::Recursing {
                name: id.name.clone(),
                count: project.deps.len(),
            });

            state.visiting.insert(id.clone());
            state.path_stack.push(id.clone());
            let result = self.install_specs(&project.deps, state, report);
            state.path_stack.pop();
            state.visiting.remove(&id);
            result?;
        }

        state.resolved.insert(id.clone());
        report.packages.push(id);
        Ok(())
    }
}
