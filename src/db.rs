//! Registry - the root storage node and the tables opened under it

use crate::expr::ExprCache;
use crate::record::Record;
use crate::storage::{StorageNode, DEFAULT_EXTENSION};
use crate::table::Table;
use crate::{Error, Result};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Registry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Document extension for every table
    pub extension: String,
    /// Primary key-expression used by [`NonDb::table`]
    pub default_key: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            default_key: "id".to_string(),
        }
    }
}

struct TableEntry {
    record_type: &'static str,
    table: Arc<dyn Any + Send + Sync>,
}

/// An embedded document store rooted at one directory.
///
/// Tables are opened lazily on first access and cached for the life of the
/// registry; nothing is scanned from disk up front.
pub struct NonDb {
    storage: StorageNode,
    options: Options,
    exprs: Arc<ExprCache>,
    tables: Mutex<HashMap<String, TableEntry>>,
}

impl NonDb {
    /// Open (creating if needed) a database at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(path, Options::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: Options) -> Result<Self> {
        let storage = StorageNode::with_extension(path, &options.extension)?;
        tracing::debug!("opened database at {}", storage.path().display());
        Ok(Self {
            storage,
            options,
            exprs: Arc::new(ExprCache::new()),
            tables: Mutex::default(),
        })
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, TableEntry>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The table for `T`, keyed by the default key-expression
    pub fn table<T: Record>(&self) -> Result<Arc<Table<T>>> {
        self.table_named(&T::schema_name(), &self.options.default_key)
    }

    /// The table for `T`, keyed by `key_expr`.
    ///
    /// The key-expression only applies when the table is first opened by
    /// this registry. Later calls return the cached table unchanged.
    pub fn table_with_key<T: Record>(&self, key_expr: &str) -> Result<Arc<Table<T>>> {
        self.table_named(&T::schema_name(), key_expr)
    }

    /// Get or open the table `name` holding records of type `T`.
    ///
    /// Fails with `Error::SchemaMismatch` if `name` is already open for a
    /// different record type.
    pub fn table_named<T: Record>(&self, name: &str, key_expr: &str) -> Result<Arc<Table<T>>> {
        let mut tables = self.registry();
        if let Some(entry) = tables.get(name) {
            let record_type = entry.record_type;
            let existing = Arc::clone(&entry.table);
            return existing
                .downcast::<Table<T>>()
                .map_err(|_| Error::SchemaMismatch {
                    name: name.to_string(),
                    existing: record_type,
                });
        }

        // TODO: reject a differing key_expr for an already-open table instead of ignoring it
        let table = Arc::new(Table::<T>::open(
            &self.storage,
            name,
            key_expr,
            Arc::clone(&self.exprs),
        )?);
        tables.insert(
            name.to_string(),
            TableEntry {
                record_type: std::any::type_name::<T>(),
                table: table.clone(),
            },
        );
        Ok(table)
    }

    /// Names of the tables open in memory
    pub fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry().keys().cloned().collect();
        names.sort();
        names
    }

    /// Delete the table for `T` and everything under it
    pub fn drop<T: Record>(&self, raise_on_missing: bool) -> Result<()> {
        self.drop_named(&T::schema_name(), raise_on_missing)
    }

    /// Delete the table `name`, its records and all of its indices.
    ///
    /// A table counts as present if it is open in memory or has a directory
    /// on disk. Missing tables are ignored unless `raise_on_missing` is set.
    pub fn drop_named(&self, name: &str, raise_on_missing: bool) -> Result<()> {
        let mut tables = self.registry();
        let was_open = tables.remove(name).is_some();
        let removed = self.storage.remove_child(name)?;

        if !was_open && !removed {
            if raise_on_missing {
                return Err(Error::NotFound(format!("table {name}")));
            }
            return Ok(());
        }
        tracing::info!("dropped table {}", name);
        Ok(())
    }
}

impl std::fmt::Debug for NonDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonDb")
            .field("path", &self.storage.path())
            .field("options", &self.options)
            .field("tables", &self.tables())
            .finish()
    }
}
