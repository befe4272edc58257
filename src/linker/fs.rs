//! Filesystem primitives shared by the linker and the persisted stores.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FsError, IoResultExt as _};

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<(), FsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).fs_op("create directory", parent)?;
    }
    Ok(())
}

/// Whether `path` itself is a symlink (broken or not).
#[must_use]
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Whether anything, including a broken symlink, exists at `path`.
#[must_use]
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Remove whatever is at `path`: a symlink, a file or a whole directory tree.
///
/// Symlinks are removed without touching what they point to. Does nothing if
/// `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_path(path: &Path) -> Result<(), FsError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).fs_op("inspect", path),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path).fs_op("remove directory", path)
    } else if meta.file_type().is_symlink() {
        remove_symlink(path)
    } else {
        fs::remove_file(path).fs_op("remove file", path)
    }
}

#[cfg(unix)]
fn remove_symlink(path: &Path) -> Result<(), FsError> {
    fs::remove_file(path).fs_op("remove symlink", path)
}

/// Directory symlinks on Windows are removed with `remove_dir`.
#[cfg(windows)]
fn remove_symlink(path: &Path) -> Result<(), FsError> {
    fs::remove_file(path)
        .or_else(|_| fs::remove_dir(path))
        .fs_op("remove symlink", path)
}

/// Recursively copy a directory tree.
///
/// Symlinks within the source tree are followed: their content is copied,
/// not the link itself.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, a source
/// entry cannot be read, or a file cannot be copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), FsError> {
    fs::create_dir_all(dst).fs_op("create directory", dst)?;
    for entry in fs::read_dir(src).fs_op("read directory", src)? {
        let entry = entry.fs_op("read directory entry", src)?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).fs_op("copy", &src_path)?;
        }
    }
    Ok(())
}

/// Copy `src` to `dst`, recursing when `src` is a directory.
///
/// # Errors
///
/// Returns an error if any part of the copy fails.
pub fn copy_any(src: &Path, dst: &Path) -> Result<(), FsError> {
    if src.is_dir() {
        copy_tree(src, dst)
    } else {
        ensure_parent_dir(dst)?;
        fs::copy(src, dst).fs_op("copy", src).map(drop)
    }
}

/// Create a symlink at `link` pointing to `source`.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
#[cfg(unix)]
pub fn create_symlink(source: &Path, link: &Path) -> Result<(), FsError> {
    std::os::unix::fs::symlink(source, link).fs_op("create symlink", link)
}

/// Create a symlink at `link` pointing to `source`.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
#[cfg(windows)]
pub fn create_symlink(source: &Path, link: &Path) -> Result<(), FsError> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, link).fs_op("create symlink", link)
    } else {
        std::os::windows::fs::symlink_file(source, link).fs_op("create symlink", link)
    }
}

/// Where the symlink at `path` points, if it is one.
#[must_use]
pub fn link_target(path: &Path) -> Option<PathBuf> {
    fs::read_link(path).ok()
}

/// Compare two paths for equality, handling UNC prefix normalization on Windows.
#[must_use]
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| -> PathBuf {
        #[cfg(windows)]
        {
            let s = p.to_string_lossy();
            if let Some(stripped) = s.strip_prefix(r"\\?\") {
                return PathBuf::from(stripped);
            }
        }
        p.to_path_buf()
    };

    normalize(a) == normalize(b)
}

/// Write `contents` to a sibling temp file and rename it over `path`.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the write
/// or rename fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), FsError> {
    ensure_parent_dir(path)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, contents).fs_op("write", &tmp)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).fs_op("rename", path);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn copies_files_and_subdirectories() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::write(src.path().join("a.txt"), b"aaa").unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        fs::write(src.path().join("sub/b.txt"), b"bbb").unwrap();

        let target = dst.path().join("out");
        copy_tree(src.path(), &target).unwrap();

        assert_eq!(fs::read(target.join("a.txt")).unwrap(), b"aaa");
        assert_eq!(fs::read(target.join("sub/b.txt")).unwrap(), b"bbb");
    }

    #[test]
    fn ensure_parent_dir_creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("file.txt");
        ensure_parent_dir(&nested).unwrap();
        assert!(dir.path().join("a").join("b").exists());
    }

    #[test]
    fn remove_path_handles_files_and_trees() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("target");
        fs::write(&file, "content").unwrap();
        remove_path(&file).unwrap();
        assert!(!file.exists());

        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("deep")).unwrap();
        fs::write(tree.join("deep/x"), "x").unwrap();
        remove_path(&tree).unwrap();
        assert!(!tree.exists());

        remove_path(&dir.path().join("nonexistent")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn remove_path_removes_link_not_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("keep"), "x").unwrap();
        let link = dir.path().join("link");
        create_symlink(&source, &link).unwrap();

        assert!(is_symlink(&link));
        remove_path(&link).unwrap();
        assert!(!path_exists(&link));
        assert!(source.join("keep").exists());
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_still_exists() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("/nonexistent/target", &link).unwrap();
        assert!(path_exists(&link));
        assert!(!link.exists());
        assert_eq!(
            link_target(&link).unwrap(),
            PathBuf::from("/nonexistent/target")
        );
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");
        write_atomic(&path, b"{}").unwrap();
        write_atomic(&path, b"{\"a\":1}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}");
        assert!(!dir.path().join("nested/state.json.tmp").exists());
    }
}
