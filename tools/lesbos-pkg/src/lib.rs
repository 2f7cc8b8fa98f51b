///
/// # lesbos-pkg - Package manager library for goboscript projects
///
/// This crate provides the library API behind the `lesbos` command: locating
/// packages on a registry or at a source URL, fetching their manifests and
/// archives, selecting feature files, and installing them (and their own
/// dependencies) under `lesbos/deps/<name>/<version>/`.
///
/// ## Library Usage
///
/// ```rust,ignore
/// use lesbos_pkg::{HttpTransport, Overrides, PackageManager, TracingObserver};
///
/// let manager = PackageManager::discover(&std::env::current_dir()?)?;
/// let settings = manager.settings(&Overrides::default())?;
/// let transport = HttpTransport::with_timeout(settings.timeout)?;
/// manager.lock(&transport, &TracingObserver, &settings)?;
/// ```
///
/// ## CLI
///
/// ```sh
/// lesbos new demo               # Create an application project
/// lesbos add --name strings -v 1.0.0
/// lesbos lock                   # Reinstall everything into lesbos/deps
/// lesbos build                  # lock, then run `goboscript build`
/// lesbos pack                   # Bundle a library into lesbos/packed
/// ```
///

pub mod archive;
pub mod cache;
pub mod config;
pub mod errors;
pub mod features;
pub mod fetcher;
pub mod init;
pub mod installer;
pub mod locator;
pub mod manager;
pub mod manifest;
pub mod observer;
pub mod pack;
pub mod transport;

pub use cache::find_project_root;
pub use config::{Overrides, Settings};
pub use errors::PackageError;
pub use init::{init_project, ProjectKind};
pub use installer::{InstallReport, Installer, PackageId};
pub use locator::{join_address, resolve_address, RegistryTemplate};
pub use manager::PackageManager;
pub use manifest::{Dependency, DependencySpec, PackageMetadata, ProjectMetadata};
pub use observer::{InstallEvent, InstallObserver, InstallWarning, RecordingObserver, TracingObserver};
pub use pack::{pack_project, PackOutput};
pub use transport::{HttpTransport, MemoryTransport, Transport};
