///
/// Retrieves one package as a unit: its `package.toml`, its own `lesbos.toml`
/// and its `package.zip`, all relative to the address the locator resolves.
///
/// Nothing is returned unless all three resources were fetched and parsed.
///

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::archive::PackageArchive;
use crate::cache::{PACKAGE_ARCHIVE, PACKAGE_MANIFEST, PROJECT_MANIFEST};
use crate::errors::PackageError;
use crate::locator::{join_address, resolve_address, RegistryTemplate};
use crate::manifest::{Dependency, PackageMetadata, ProjectMetadata};
use crate::transport::Transport;

#[derive(Debug)]
pub struct FetchedPackage {
    pub address: String,
    pub package: PackageMetadata,
    pub project: ProjectMetadata,
    pub archive: PackageArchive,
}

pub fn fetch_package<T: Transport + ?Sized>(
    transport: &T,
    dep: &Dependency,
    template: &RegistryTemplate,
) -> Result<FetchedPackage, PackageError> {
    let address = resolve_address(dep, template);
    debug!(dependency = dep.identity(), version = dep.version(), %address, "fetching package");

    let package: PackageMetadata = fetch_toml(transport, &address, PACKAGE_MANIFEST)?;
    let project: ProjectMetadata = fetch_toml(transport, &address, PROJECT_MANIFEST)?;

    let bytes = transport.fetch(&address, PACKAGE_ARCHIVE)?;
    let archive = PackageArchive::from_bytes(bytes).map_err(|e| PackageError::Parse {
        url: join_address(&[address.as_str(), PACKAGE_ARCHIVE]),
        resource: PACKAGE_ARCHIVE.to_string(),
        reason: e.to_string(),
    })?;

    Ok(FetchedPackage {
        address,
        package,
        project,
        archive,
    })
}

fn fetch_toml<T: Transport + ?Sized, D: DeserializeOwned>(
    transport: &T,
    address: &str,
    resource: &str,
) -> Result<D, PackageError> {
    let bytes = transport.fetch(address, resource)?;
    let parse_error = |reason: String| PackageError::Parse {
        url: join_address(&[address, resource]),
        resource: resource.to_string(),
        reason,
    };

    let text = String::from_utf8(bytes).map_err(|e| parse_error(e.to_string()))?;
    toml::from_str(&text).map_err(|e| parse_error(e.to_string()))
}
