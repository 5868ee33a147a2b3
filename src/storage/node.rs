//! Storage nodes - directories of flat documents with memoized children

use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Extension used when none is configured
pub const DEFAULT_EXTENSION: &str = "json";

/// A directory holding `<name>.<ext>` documents and named child nodes.
///
/// Children are created on demand and memoized: asking for the same child
/// twice yields the same `Arc`, and the directory is only created the first
/// time.
#[derive(Debug)]
pub struct StorageNode {
    path: PathBuf,
    extension: String,
    children: Mutex<HashMap<String, Arc<StorageNode>>>,
}

impl StorageNode {
    /// Open (creating if needed) a node with the default `json` extension
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_extension(path, DEFAULT_EXTENSION)
    }

    /// Open (creating if needed) a node with a custom document extension
    pub fn with_extension(path: impl Into<PathBuf>, extension: &str) -> Result<Self> {
        let path = ensure_dir(path.into())?;
        Ok(Self {
            path,
            extension: extension.trim_start_matches('.').to_string(),
            children: Mutex::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether the directory is currently present on disk
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Recreate the directory if something removed it
    pub fn ensure(&self) -> Result<()> {
        ensure_dir(self.path.clone()).map(|_| ())
    }

    // ========== Documents ==========

    /// `name` with the extension appended unless it already carries it
    pub fn canonical_name(&self, name: &str) -> String {
        let suffix = format!(".{}", self.extension);
        if name.ends_with(&suffix) {
            name.to_string()
        } else {
            format!("{name}{suffix}")
        }
    }

    /// Full path of the document `name`
    pub fn document_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.path.join(self.canonical_name(name)))
    }

    /// Lazily list the paths of documents carrying this node's extension.
    ///
    /// Unordered. Directories are skipped even if their name matches.
    pub fn list_documents(&self) -> Result<impl Iterator<Item = Result<PathBuf>>> {
        let entries = fs::read_dir(&self.path)?;
        let extension = self.extension.clone();

        Ok(entries.filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != extension.as_str()) {
                return None;
            }
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => None,
                Ok(_) => Some(Ok(path)),
                Err(e) => Some(Err(e.into())),
            }
        }))
    }

    /// Lazily list document names (file stems)
    pub fn names(&self) -> Result<impl Iterator<Item = Result<String>>> {
        Ok(self
            .list_documents()?
            .map(|path| path.map(|p| document_stem(&p))))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.document_path(name).is_ok_and(|path| path.is_file())
    }

    /// Read a document, failing with `Error::NotFound` if it is absent
    pub fn read(&self, name: &str) -> Result<String> {
        let path = self.document_path(name)?;
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })
    }

    /// Lazily read every current document as `(name, content)`.
    ///
    /// Documents removed between listing and reading are skipped.
    pub fn read_all(&self) -> Result<impl Iterator<Item = Result<(String, String)>>> {
        Ok(self.list_documents()?.filter_map(|path| {
            let path = match path {
                Ok(path) => path,
                Err(e) => return Some(Err(e)),
            };
            match fs::read_to_string(&path) {
                Ok(content) => Some(Ok((document_stem(&path), content))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => Some(Err(e.into())),
            }
        }))
    }

    /// Create or overwrite a document.
    ///
    /// Content goes to a hidden temporary sibling first and is renamed into
    /// place, so readers see either the old or the new document.
    pub fn write(&self, name: &str, text: &str) -> Result<()> {
        let path = self.document_path(name)?;
        let staging = self.path.join(format!(".{}.tmp", self.canonical_name(name)));
        fs::write(&staging, text)?;
        if let Err(e) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        tracing::debug!("wrote {}", path.display());
        Ok(())
    }

    /// Delete a document. Returns false if it was already absent.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.document_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("deleted {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // ========== Children ==========

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<StorageNode>>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get or create the child node `name`
    pub fn add_child(&self, name: &str) -> Result<Arc<StorageNode>> {
        validate_name(name)?;
        let mut children = self.registry();
        if let Some(child) = children.get(name) {
            return Ok(Arc::clone(child));
        }
        let child = Arc::new(StorageNode::with_extension(
            self.path.join(name),
            &self.extension,
        )?);
        tracing::debug!("created storage node {}", child.path.display());
        children.insert(name.to_string(), Arc::clone(&child));
        Ok(child)
    }

    /// Look up an already known child without creating it
    pub fn child(&self, name: &str) -> Option<Arc<StorageNode>> {
        self.registry().get(name).cloned()
    }

    /// Names of the children currently known in memory
    pub fn children(&self) -> Vec<String> {
        self.registry().keys().cloned().collect()
    }

    /// Remove a child's whole subtree and forget it.
    ///
    /// Works for children that were never opened in memory too.
    /// Returns false if there was nothing on disk or in memory.
    pub fn remove_child(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let known = self.registry().remove(name);
        match known {
            Some(child) => {
                child.remove_storage()?;
                Ok(true)
            }
            None => remove_tree(&self.path.join(name)),
        }
    }

    /// Remove a child directory only if it is empty, and forget it.
    ///
    /// Returns true if a directory was removed.
    pub fn prune_child(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let path = self.path.join(name);
        let is_empty = match fs::read_dir(&path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.registry().remove(name);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        if !is_empty {
            return Ok(false);
        }
        fs::remove_dir(&path)?;
        self.registry().remove(name);
        tracing::debug!("pruned empty node {}", path.display());
        Ok(true)
    }

    /// Recursively delete this node's directory and every known child's
    /// directory, then clear the child registry. Idempotent.
    pub fn remove_storage(&self) -> Result<()> {
        let children: Vec<Arc<StorageNode>> =
            self.registry().drain().map(|(_, child)| child).collect();
        for child in children {
            child.remove_storage()?;
        }
        remove_tree(&self.path)?;
        Ok(())
    }
}

/// Create `path` as a directory if absent.
///
/// Fails with `Error::NotADirectory` if something else already lives there.
pub fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => Ok(path),
        Ok(_) => Err(Error::NotADirectory(path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(&path).map_err(|e| match e.kind() {
                io::ErrorKind::NotADirectory | io::ErrorKind::AlreadyExists => {
                    Error::NotADirectory(path.clone())
                }
                _ => Error::Io(e),
            })?;
            Ok(path)
        }
        Err(e) => Err(e.into()),
    }
}

/// Reject names that would escape or alias the node's directory
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidKey(format!("`{name}` is not a usable file name")));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidKey(format!(
            "`{name}` contains a path separator or NUL"
        )));
    }
    Ok(())
}

fn remove_tree(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!("removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
