//! Small filesystem steps with errors that carry the path involved.

use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

/// Removes a file or a whole directory tree. A missing path is not an error.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    let removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => Err(err),
    };

    match removed {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(FileSystemError::File {
            path: path.to_path_buf(),
            action: "remove",
            source: err,
        }),
        _ => Ok(()),
    }
}

/// Creates `path` and its parents unless it is already a directory.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    fs::create_dir_all(path).map_err(|source| FileSystemError::Directory {
        path: path.to_path_buf(),
        action: "create",
        source,
    })
}

/// Moves `from` over `to`, replacing a file already at `to`.
pub fn rename<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> FileSystemResult<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    fs::rename(from, to).map_err(|source| FileSystemError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

/// Appends `suffix` to the last component, keeping any extension:
/// `titles.pack` becomes `titles.pack.bak`.
///
/// ```
/// use std::path::PathBuf;
/// use titledb_utils::fs::with_suffix;
///
/// assert_eq!(with_suffix("db/titles.pack", ".bak"), PathBuf::from("db/titles.pack.bak"));
/// ```
pub fn with_suffix<P: AsRef<Path>>(path: P, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_ref());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_safe_remove() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("titles.pack.bak");
        let tree = dir.path().join("icons");
        fs::write(&file, b"old").unwrap();
        fs::create_dir_all(tree.join("nested")).unwrap();
        fs::write(tree.join("nested/a.png"), b"png").unwrap();

        safe_remove(&file).unwrap();
        safe_remove(&tree).unwrap();
        assert!(!file.exists());
        assert!(!tree.exists());

        // already gone
        safe_remove(&file).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("data/offline_db");
        ensure_dir_exists(&nested).unwrap();
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());

        let file = dir.path().join("manifest.json");
        fs::write(&file, "{}").unwrap();
        assert!(matches!(
            ensure_dir_exists(&file),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_rename() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("icons.pack.download");
        let to = dir.path().join("icons.pack");
        fs::write(&from, "new").unwrap();
        fs::write(&to, "old").unwrap();

        rename(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "new");

        assert!(matches!(
            rename(&from, &to),
            Err(FileSystemError::Rename { .. })
        ));
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix("/data/offline_db/manifest.json", ".download"),
            PathBuf::from("/data/offline_db/manifest.json.download")
        );
        assert_eq!(with_suffix("icons", ".bak"), PathBuf::from("icons.bak"));
    }
}
