//! Index links
//!
//! Real symbolic links where the platform has them. Elsewhere a link is a
//! small pointer file holding the relative target path. On Windows creating
//! symlinks needs Developer Mode or the corresponding privilege.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Create `link` pointing at `target`. Relative targets resolve against the link's directory.
#[cfg(unix)]
pub fn create(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub fn create(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
pub fn create(target: &Path, link: &Path) -> io::Result<()> {
    fs::write(link, target.to_string_lossy().as_bytes())
}

/// Path to read through to reach the linked document
#[cfg(any(unix, windows))]
pub fn resolve(link: &Path) -> io::Result<PathBuf> {
    Ok(link.to_path_buf())
}

#[cfg(not(any(unix, windows)))]
pub fn resolve(link: &Path) -> io::Result<PathBuf> {
    let target = fs::read_to_string(link)?;
    let base = link.parent().unwrap_or_else(|| Path::new("."));
    Ok(base.join(target.trim()))
}

/// True if `path` itself is a link (the target is not followed)
pub fn is_link(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        #[cfg(any(unix, windows))]
        Ok(meta) => meta.file_type().is_symlink(),
        #[cfg(not(any(unix, windows)))]
        Ok(meta) => meta.is_file(),
        Err(_) => false,
    }
}

/// True if `link` is a link whose target no longer exists
pub fn is_dangling(link: &Path) -> bool {
    is_link(link) && !resolve(link).map(|target| target.exists()).unwrap_or(false)
}

/// Content of the linked document, `None` when the target is gone
pub fn read_target(link: &Path) -> io::Result<Option<String>> {
    let target = match resolve(link) {
        Ok(target) => target,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    match fs::read_to_string(target) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove a link without touching its target. Absent links are not an error.
pub fn remove(link: &Path) -> io::Result<bool> {
    match fs::remove_file(link) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_link_lifecycle() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("1.json");
        let leaf = dir.path().join("leaf");
        fs::create_dir(&leaf).unwrap();
        fs::write(&target, "{}").unwrap();

        let link = leaf.join("1.json");
        create(Path::new("../1.json"), &link).unwrap();
        assert!(is_link(&link));
        assert!(!is_dangling(&link));
        assert_eq!(read_target(&link).unwrap().as_deref(), Some("{}"));

        fs::remove_file(&target).unwrap();
        assert!(is_link(&link));
        assert!(is_dangling(&link));
        assert_eq!(read_target(&link).unwrap(), None);

        assert!(remove(&link).unwrap());
        assert!(!remove(&link).unwrap());
        assert!(!is_link(&link));
    }

    #[test]
    fn test_regular_file_is_not_a_link() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.json");
        fs::write(&file, "{}").unwrap();
        assert!(!is_link(&file));
        assert!(!is_dangling(&file));
    }
}
