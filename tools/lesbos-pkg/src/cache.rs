///
/// # Install Directory Layout
///
/// Installed packages live under an install root (normally `lesbos/deps/`
/// inside the project) as:
///
/// ```text
/// <root>/<package name>/<package version>/<relative file path>
/// ```
///
/// The external build step reads files from exactly these paths.
///
/// A file that already exists at its destination counts as installed and is
/// never rewritten. That existence check is the only cache: there is no index
/// and no content hash. Writes go through a `.partial` sibling and a rename so
/// an interrupted install cannot leave a truncated file behind.
///
/// Package names, versions and file paths all come from the network, so every
/// path is checked to stay below the install root before it is touched.
///
/// ## Project Root Discovery
///
/// `find_project_root()` walks up from a starting directory looking for
/// `lesbos.toml`.
///

use std::path::{Component, Path, PathBuf};

use crate::errors::PackageError;

pub const PROJECT_MANIFEST: &str = "lesbos.toml";
pub const PACKAGE_MANIFEST: &str = "package.toml";
pub const PACKAGE_ARCHIVE: &str = "package.zip";
pub const WORK_DIR: &str = "lesbos";

pub fn deps_dir(project_root: &Path) -> PathBuf {
    project_root.join(WORK_DIR).join("deps")
}

pub fn packed_dir(project_root: &Path) -> PathBuf {
    project_root.join(WORK_DIR).join("packed")
}

pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;

    loop {
        if current.join(PROJECT_MANIFEST).is_file() {
            return Some(current.to_path_buf());
        }

        current = current.parent()?;
    }
}

pub fn is_project(dir: &Path) -> bool {
    dir.join(PROJECT_MANIFEST).is_file()
}

pub fn is_library(dir: &Path) -> bool {
    is_project(dir) && dir.join(PACKAGE_MANIFEST).is_file()
}

/// `<root>/<name>/<version>`, provided both are plain single path segments.
pub fn pack_dir(root: &Path, name: &str, version: &str) -> Result<PathBuf, PackageError> {
    for segment in [name, version] {
        if !is_plain_segment(segment) {
            return Err(PackageError::PathEscape {
                package: name.to_string(),
                path: format!("{}/{}", name, version),
            });
        }
    }
    Ok(root.join(name).join(version))
}

/// Joins an archive-relative path onto `pack_dir`, rejecting anything that
/// could land outside it.
pub fn contained_path(pack_dir: &Path, package: &str, relative: &str) -> Result<PathBuf, PackageError> {
    let escape = || PackageError::PathEscape {
        package: package.to_string(),
        path: relative.to_string(),
    };

    if relative.contains('\\') || relative.contains('\0') {
        return Err(escape());
    }

    let mut cleaned = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }

    if cleaned.as_os_str().is_empty() {
        return Err(escape());
    }

    Ok(pack_dir.join(cleaned))
}

/// Writes `bytes` to `dest` unless it already exists. Returns whether a write
/// happened.
pub fn write_if_missing(dest: &Path, bytes: &[u8]) -> Result<bool, PackageError> {
    if dest.exists() {
        return Ok(false);
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    std::fs::write(&partial, bytes)?;
    std::fs::rename(&partial, dest)?;
    Ok(true)
}

fn is_plain_segment(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !segment.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_pack_dir_layout() {
        let root = Path::new("/project/lesbos/deps");
        assert_eq!(
            pack_dir(root, "foo", "1.0.0").unwrap(),
            PathBuf::from("/project/lesbos/deps/foo/1.0.0")
        );
    }

    #[test]
    fn test_pack_dir_rejects_hostile_identity() {
        let root = Path::new("/deps");
        for (name, version) in [("..", "1.0.0"), ("foo", ".."), ("a/b", "1"), ("foo", "/etc"), ("", "1"), ("foo", ".")] {
            assert!(
                matches!(pack_dir(root, name, version), Err(PackageError::PathEscape { .. })),
                "{:?} / {:?} should be rejected",
                name,
                version
            );
        }
    }

    #[test]
    fn test_contained_path_accepts_nested_relative() {
        let dir = Path::new("/deps/foo/1.0.0");
        assert_eq!(
            contained_path(dir, "foo", "lib/util.gs").unwrap(),
            PathBuf::from("/deps/foo/1.0.0/lib/util.gs")
        );
        assert_eq!(
            contained_path(dir, "foo", "./main.gs").unwrap(),
            PathBuf::from("/deps/foo/1.0.0/main.gs")
        );
    }

    #[test]
    fn test_contained_path_rejects_traversal() {
        let dir = Path::new("/deps/foo/1.0.0");
        for path in ["../evil.gs", "lib/../../evil.gs", "/etc/passwd", "..\\evil.gs", "", "."] {
            match contained_path(dir, "foo", path) {
                Err(PackageError::PathEscape { package, path: rejected }) => {
                    assert_eq!(package, "foo");
                    assert_eq!(rejected, path);
                }
                other => panic!("{:?} should be rejected, got {:?}", path, other),
            }
        }
    }

    #[test]
    fn test_write_if_missing_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("foo").join("1.0.0").join("lib").join("util.gs");

        assert!(write_if_missing(&dest, b"util").unwrap());
        assert_eq!(fs::read(&dest).unwrap(), b"util");
        assert!(!dest.with_file_name("util.gs.partial").exists());
    }

    #[test]
    fn test_write_if_missing_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("main.gs");
        fs::write(&dest, "local edit").unwrap();

        assert!(!write_if_missing(&dest, b"upstream").unwrap());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "local edit");
    }

    #[test]
    fn test_find_project_root_no_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();

        assert!(find_project_root(&nested).is_none());
    }

    #[test]
    fn test_find_project_root_finds_manifest() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("lesbos.toml"), "").unwrap();

        let nested = temp_dir.path().join("assets").join("nested");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), Some(temp_dir.path().to_path_buf()));
    }

    #[test]
    fn test_library_detection() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_project(temp_dir.path()));

        fs::write(temp_dir.path().join("lesbos.toml"), "").unwrap();
        assert!(is_project(temp_dir.path()));
        assert!(!is_library(temp_dir.path()));

        fs::write(temp_dir.path().join("package.toml"), "").unwrap();
        assert!(is_library(temp_dir.path()));
    }

    #[test]
    fn test_work_dirs() {
        let root = Path::new("/project");
        assert_eq!(deps_dir(root), PathBuf::from("/project/lesbos/deps"));
        assert_eq!(packed_dir(root), PathBuf::from("/project/lesbos/packed"));
    }
}
