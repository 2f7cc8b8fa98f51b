///
/// # Project Manager
///
/// The `PackageManager` struct is the entry point for the CLI. It owns the
/// parsed `lesbos.toml` of one project and runs the project-level commands
/// against it.
///
/// ## Commands
///
/// - `add_dependency()` appends a dependency table to `lesbos.toml`
/// - `lock()` wipes `lesbos/deps/` and reinstalls every declared dependency
/// - `build()` locks (unless told not to), then runs `<compiler> build` in the
///   project root
/// - `pack()` bundles a library into `lesbos/packed/`
///
/// Transport and observer are passed in per call so the CLI can use the real
/// HTTP client while tests use an in-memory one.
///

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::cache::{deps_dir, find_project_root, is_library, PROJECT_MANIFEST};
use crate::config::{Overrides, Settings};
use crate::errors::PackageError;
use crate::installer::{InstallReport, Installer};
use crate::manifest::{append_dependency, parse_project, Dependency, DependencySpec, ProjectMetadata};
use crate::observer::InstallObserver;
use crate::pack::{pack_project, PackOutput};
use crate::transport::Transport;

pub struct PackageManager {
    project: ProjectMetadata,
    root: PathBuf,
}

impl PackageManager {
    pub fn from_project_root(root: &Path) -> Result<Self, PackageError> {
        let project = parse_project(&root.join(PROJECT_MANIFEST))?;
        Ok(Self {
            project,
            root: root.to_path_buf(),
        })
    }

    /// Finds the nearest `lesbos.toml` at or above `start`.
    pub fn discover(start: &Path) -> Result<Self, PackageError> {
        let root = find_project_root(start).ok_or_else(|| PackageError::ManifestNotFound {
            path: start.join(PROJECT_MANIFEST),
        })?;
        Self::from_project_root(&root)
    }

    pub fn from_project(project: ProjectMetadata, root: PathBuf) -> Self {
        Self { project, root }
    }

    pub fn project(&self) -> &ProjectMetadata {
        &self.project
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(PROJECT_MANIFEST)
    }

    pub fn deps_dir(&self) -> PathBuf {
        deps_dir(&self.root)
    }

    pub fn is_library(&self) -> bool {
        is_library(&self.root)
    }

    pub fn has_dependencies(&self) -> bool {
        !self.project.deps.is_empty()
    }

    pub fn settings(&self, overrides: &Overrides) -> Result<Settings, PackageError> {
        Settings::resolve(&self.project.options, overrides)
    }

    pub fn add_dependency(&mut self, dep: &Dependency) -> Result<(), PackageError> {
        append_dependency(&self.manifest_path(), dep)?;
        self.project.deps.push(DependencySpec::from(dep));
        info!(dependency = dep.identity(), version = dep.version(), "added dependency");
        Ok(())
    }

    pub fn lock<T, O>(&self, transport: &T, observer: &O, settings: &Settings) -> Result<InstallReport, PackageError>
    where
        T: Transport + ?Sized,
        O: InstallObserver + ?Sized,
    {
        let deps = self.deps_dir();
        if deps.exists() {
            std::fs::remove_dir_all(&deps)?;
        }
        std::fs::create_dir_all(&deps)?;

        let installer = Installer::new(transport, observer, settings.registry.clone(), deps);
        let report = installer.install_many(&self.project.deps)?;

        info!(
            packages = report.packages.len(),
            written = report.written.len(),
            "lock complete"
        );
        Ok(report)
    }

    pub fn build<T, O>(
        &self,
        transport: &T,
        observer: &O,
        settings: &Settings,
        no_lock: bool,
    ) -> Result<Option<InstallReport>, PackageError>
    where
        T: Transport + ?Sized,
        O: InstallObserver + ?Sized,
    {
        let report = if no_lock {
            None
        } else {
            Some(self.lock(transport, observer, settings)?)
        };

        self.run_compiler(&settings.compiler)?;
        Ok(report)
    }

    pub fn run_compiler(&self, compiler: &str) -> Result<(), PackageError> {
        let command = format!("{} build", compiler);
        info!(%command, root = %self.root.display(), "running compiler");

        let status = Command::new(compiler)
            .arg("build")
            .current_dir(&self.root)
            .status()
            .map_err(|e| PackageError::BuildFailed {
                command: command.clone(),
                status: e.to_string(),
            })?;

        if !status.success() {
            return Err(PackageError::BuildFailed {
                command,
                status: status.to_string(),
            });
        }
        Ok(())
    }

    pub fn pack(&self) -> Result<PackOutput, PackageError> {
        pack_project(&self.root)
    }
}
