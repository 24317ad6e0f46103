//! Host path resolution.
//!
//! Images and bind directories are handed to the container runtime as
//! absolute, symlink-free paths so that the same directory reached through
//! two different spellings only ever produces one bind.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and resolve symlinks as far as it exists.
///
/// Symlinks are resolved before any `..` is applied, so `link/../data`
/// lands next to the link's target, not next to the link. Components past
/// the deepest existing ancestor are appended lexically, so resolving a
/// directory that does not exist yet still yields an absolute path instead
/// of an error.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    if let Ok(resolved) = absolute.canonicalize() {
        return Ok(resolved);
    }

    let components: Vec<Component> = absolute.components().collect();
    for split in (1..components.len()).rev() {
        let base: PathBuf = components[..split].iter().collect();
        if let Ok(resolved) = base.canonicalize() {
            return Ok(append_lexically(resolved, &components[split..]));
        }
    }
    Ok(append_lexically(PathBuf::new(), &components))
}

/// Canonicalize a path that must exist.
pub fn resolve_existing(path: &Path) -> io::Result<PathBuf> {
    path.canonicalize()
}

/// Push `parts` onto `base`, dropping `.` and folding `..` into the parent.
fn append_lexically(mut base: PathBuf, parts: &[Component]) -> PathBuf {
    for part in parts {
        match part {
            Component::CurDir => {}
            Component::ParentDir => {
                base.pop();
            }
            other => base.push(other.as_os_str()),
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_path(dir.path()).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_missing_tail() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("not").join("there");
        let resolved = resolve_path(&target).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(
            resolved,
            dir.path().canonicalize().unwrap().join("not").join("there")
        );
    }

    #[test]
    fn test_resolve_dot_components() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        let messy = dir.path().join("a").join(".").join("..").join("a");
        assert_eq!(
            resolve_path(&messy).unwrap(),
            dir.path().join("a").canonicalize().unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert_eq!(resolve_path(&link).unwrap(), real.canonicalize().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_parent_of_symlink_follows_target() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("x")).unwrap();
        std::fs::create_dir_all(root.join("other").join("deep")).unwrap();
        std::os::unix::fs::symlink(root.join("other").join("deep"), root.join("x").join("link"))
            .unwrap();

        let through_link = root.join("x").join("link").join("..").join("data");
        assert_eq!(
            resolve_path(&through_link).unwrap(),
            root.join("other").join("data")
        );

        std::fs::create_dir(root.join("other").join("data")).unwrap();
        assert_eq!(
            resolve_path(&through_link).unwrap(),
            through_link.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_resolve_existing_requires_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_existing(&dir.path().join("missing.sif")).is_err());
    }
}
