///
/// # Project Initialization Module
///
/// Scaffolding for new goboscript projects. Every project gets:
///
/// - `lesbos/` - working directory for installed dependencies and packed output
/// - `README.md`
/// - `lesbos.toml` - project options and dependencies
///
/// Libraries additionally get a `package.toml` declaring a `core` feature and a
/// `main.gs` with a hello function. Applications get a blank costume, a
/// `main.gs` sprite, a `stage.gs` and an empty `goboscript.toml` so the
/// compiler can build them straight away.
///
/// ## Error Handling
///
/// Returns `PackageError::ProjectExists` when a folder or file is already
/// present, unless `force` is set, in which case folders are reused and files
/// are overwritten.
///

use std::path::{Path, PathBuf};
use crate::errors::PackageError;
use crate::manifest::{default_package_manifest, default_project_manifest};

const LIB_MAIN: &str = r#"func hello() {
	return "Hello, world!";
}
"#;

const APP_MAIN: &str = r#"costumes "assets/blank.svg";

onflag {
    say "Hello, world!";
}
"#;

const APP_STAGE: &str = r#"costumes "assets/blank.svg";
"#;

const BLANK_SVG: &str = r#"<svg
    version="1.1"
    width="0"
    height="0"
    viewBox="0 0 0 0"
    xmlns="http://www.w3.org/2000/svg"
    xmlns:xlink="http://www.w3.org/1999/xlink"
></svg>
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Application,
    Library,
}

pub fn init_project(dir: &Path, kind: ProjectKind, force: bool) -> Result<Vec<PathBuf>, PackageError> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PackageError::InvalidManifest(format!("Cannot derive a project name from {}", dir.display())))?;

    let mut created = Vec::new();

    create_folder(dir, force)?;
    create_folder(&dir.join("lesbos"), force)?;

    created.push(create_file(&dir.join("README.md"), &format!("# {}\n", name), force)?);
    created.push(create_file(&dir.join("lesbos.toml"), &default_project_manifest(), force)?);

    match kind {
        ProjectKind::Library => {
            created.push(create_file(&dir.join("package.toml"), &default_package_manifest(&name)?, force)?);
            created.push(create_file(&dir.join("main.gs"), LIB_MAIN, force)?);
        }
        ProjectKind::Application => {
            create_folder(&dir.join("assets"), force)?;
            created.push(create_file(&dir.join("assets").join("blank.svg"), BLANK_SVG, force)?);
            created.push(create_file(&dir.join("main.gs"), APP_MAIN, force)?);
            created.push(create_file(&dir.join("stage.gs"), APP_STAGE, force)?);
            created.push(create_file(&dir.join("goboscript.toml"), "", force)?);
        }
    }

    Ok(created)
}

fn create_folder(path: &Path, force: bool) -> Result<(), PackageError> {
    if path.exists() {
        if force && path.is_dir() {
            return Ok(());
        }
        return Err(PackageError::ProjectExists {
            path: path.to_path_buf(),
        });
    }
    std::fs::create_dir_all(path)?;
    Ok(())
}

fn create_file(path: &Path, contents: &str, force: bool) -> Result<PathBuf, PackageError> {
    if path.exists() && !force {
        return Err(PackageError::ProjectExists {
            path: path.to_path_buf(),
        });
    }
    std::fs::write(path, contents)?;
    Ok(path.to_path_buf())
}
