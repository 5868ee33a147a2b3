//! Secondary indices - derived keys materialized as link trees
//!
//! An index on `expr` lives in the table directory as `_index@<expr>/`.
//! Each derived key gets a subdirectory holding one link per primary key:
//!
//! ```text
//! Person/_index@category/admin/1.json -> ../../1.json
//! Person/_index@category/admin/3.json -> ../../3.json
//! Person/_index@category/user/2.json  -> ../../2.json
//! ```
//!
//! Invariants:
//! - a primary key is linked under at most one derived key
//! - no derived-key directory is left empty
//! - links target existing records, except after external changes or a
//!   partial failure. [`Index::vacuum_index`] and [`Index::rebuild_index`]
//!   restore this; nothing repairs it automatically.
//!
//! A record whose derived key is `null`, an array, an object, or not usable
//! as a directory name (for example `a/b`) is kept in the table but left out
//! of the index.

use crate::expr::{key_string, KeyExpr};
use crate::record::Record;
use crate::storage::{link, validate_name, StorageNode};
use crate::table::TableCore;
use crate::Result;
use serde::Serialize;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Directory-name prefix of index trees inside a table directory
pub const INDEX_PREFIX: &str = "_index@";

/// An exact-match secondary index over a table.
#[derive(Debug)]
pub struct Index<T> {
    table: Arc<TableCore<T>>,
    storage: Arc<StorageNode>,
    expr: Arc<KeyExpr>,
}

impl<T: Record> Index<T> {
    pub(crate) fn open(table: Arc<TableCore<T>>, expr: Arc<KeyExpr>) -> Result<Self> {
        let storage = table
            .storage()
            .add_child(&format!("{INDEX_PREFIX}{}", expr.as_str()))?;
        Ok(Self {
            table,
            storage,
            expr,
        })
    }

    /// Source text of the index expression
    pub fn expression(&self) -> &str {
        self.expr.as_str()
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    /// Derived key of `record`, or `None` if the record is not indexed
    pub fn key_for(&self, record: &T) -> Result<Option<String>> {
        let value = match self.expr.evaluate(&record.field_map()?) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("not indexing under {}: {}", self.expression(), e);
                return Ok(None);
            }
        };
        let key = match key_string(&value) {
            Ok(key) => key,
            Err(kind) => {
                tracing::debug!("{} evaluated to {}, not indexed", self.expression(), kind);
                return Ok(None);
            }
        };
        if let Err(e) = validate_name(&key) {
            tracing::warn!("not indexing under {}: {}", self.expression(), e);
            return Ok(None);
        }
        Ok(Some(key))
    }

    // ========== Link management ==========

    fn link(&self, index_key: &str, primary_key: &str) -> Result<()> {
        let leaf = self.storage.add_child(index_key)?;
        leaf.ensure()?;
        let link_path = leaf.document_path(primary_key)?;
        link::remove(&link_path)?;

        let target = Path::new("..")
            .join("..")
            .join(self.table.storage().canonical_name(primary_key));
        link::create(&target, &link_path)?;
        tracing::debug!("linked {} -> {}", link_path.display(), target.display());
        Ok(())
    }

    /// Remove the link for `primary_key` under `index_key`, pruning the
    /// directory if it ends up empty. Dangling links are removed too.
    fn unlink(&self, index_key: &str, primary_key: &str) -> Result<bool> {
        let link_path = self
            .storage
            .path()
            .join(index_key)
            .join(self.storage.canonical_name(primary_key));
        if !link::is_link(&link_path) {
            return Ok(false);
        }
        link::remove(&link_path)?;
        self.storage.prune_child(index_key)?;
        tracing::debug!("unlinked {}", link_path.display());
        Ok(true)
    }

    fn unlink_all(&self, primary_key: &str) -> Result<bool> {
        let mut removed = false;
        for index_key in self.key_dirs()? {
            removed |= self.unlink(&index_key, primary_key)?;
        }
        Ok(removed)
    }

    /// Names of the derived-key directories currently on disk
    fn key_dirs(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.storage.path()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                keys.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(keys)
    }

    // ========== Record management ==========

    /// Point the index at the current state of `record`.
    ///
    /// Every existing link for its primary key is dropped first, so a record
    /// whose derived key changed moves to its new directory, and one that
    /// lost its derived key leaves the index.
    pub fn put(&self, record: &T) -> Result<()> {
        let primary_key = self.table.key_for(record)?;
        self.unlink_all(&primary_key)?;
        match self.key_for(record)? {
            Some(index_key) => self.link(&index_key, &primary_key),
            None => Ok(()),
        }
    }

    /// Records whose derived key equals `key`. Dangling links are skipped.
    pub fn get(&self, key: impl Display) -> Result<Vec<T>> {
        let key = key.to_string();
        validate_name(&key)?;
        let entries = match fs::read_dir(self.storage.path().join(&key)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path
                .extension()
                .is_none_or(|ext| ext != self.storage.extension())
            {
                continue;
            }
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match link::read_target(&path)? {
                Some(text) => records.push(T::from_json(&name, &text)?),
                None => tracing::warn!("skipping dangling index link {}", path.display()),
            }
        }
        Ok(records)
    }

    /// Drop `record` from the index. Returns false if it was not linked.
    pub fn delete(&self, record: &T) -> Result<bool> {
        let primary_key = self.table.key_for(record)?;
        match self.key_for(record)? {
            Some(index_key) => self.unlink(&index_key, &primary_key),
            None => self.unlink_all(&primary_key),
        }
    }

    /// Derived keys that currently have at least one link
    pub fn keys(&self) -> Result<Vec<String>> {
        self.key_dirs()
    }

    // ========== Maintenance ==========

    /// Delete the whole index tree. Removing an absent index is not an error.
    pub fn remove_index(&self) -> Result<()> {
        self.storage.remove_storage()?;
        tracing::info!("removed index {}", self.path().display());
        Ok(())
    }

    /// Regenerate the index from every record in the table.
    ///
    /// Returns the number of records indexed. Records without a usable
    /// derived key are skipped.
    pub fn rebuild_index(&self) -> Result<usize> {
        self.remove_index()?;
        self.storage.ensure()?;

        // Fresh tree: nothing to unlink before linking.
        let mut count = 0;
        for record in self.table.records()? {
            let record = record?;
            let Some(index_key) = self.key_for(&record)? else {
                continue;
            };
            let primary_key = self.table.key_for(&record)?;
            self.link(&index_key, &primary_key)?;
            count += 1;
        }
        tracing::info!("rebuilt index {} ({} records)", self.expression(), count);
        Ok(count)
    }

    /// Remove links whose record is gone, then any directory left empty.
    ///
    /// Links to existing records are never touched.
    pub fn vacuum_index(&self) -> Result<VacuumReport> {
        let mut report = VacuumReport::default();
        for index_key in self.key_dirs()? {
            for entry in fs::read_dir(self.storage.path().join(&index_key))? {
                let path = entry?.path();
                if link::is_dangling(&path) && link::remove(&path)? {
                    tracing::debug!("removed dangling link {}", path.display());
                    report.links_removed += 1;
                }
            }
            if self.storage.prune_child(&index_key)? {
                report.dirs_removed += 1;
            }
        }
        tracing::info!("vacuumed index {}: {}", self.expression(), report);
        Ok(report)
    }
}

/// What a vacuum pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VacuumReport {
    pub links_removed: usize,
    pub dirs_removed: usize,
}

impl std::fmt::Display for VacuumReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} dangling links, {} empty directories removed",
            self.links_removed, self.dirs_removed
        )
    }
}
