//! Tables - one directory per record type, one document per record

use crate::expr::{ExprCache, KeyExpr};
use crate::index::Index;
use crate::record::Record;
use crate::storage::StorageNode;
use crate::Result;
use serde::Serialize;
use std::fmt::Display;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// The part of a table its indices need: where records live and how they are keyed.
#[derive(Debug)]
pub(crate) struct TableCore<T> {
    name: String,
    storage: Arc<StorageNode>,
    key_expr: Arc<KeyExpr>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> TableCore<T> {
    pub(crate) fn storage(&self) -> &Arc<StorageNode> {
        &self.storage
    }

    pub(crate) fn key_for(&self, record: &T) -> Result<String> {
        self.key_expr.evaluate_key(&record.field_map()?)
    }

    pub(crate) fn records(&self) -> Result<impl Iterator<Item = Result<T>>> {
        Ok(self
            .storage
            .read_all()?
            .map(|entry| entry.and_then(|(name, text)| T::from_json(&name, &text))))
    }
}

/// A typed table bound to one storage node and one primary key-expression.
///
/// Every mutation is forwarded to the attached indices in the order they
/// were registered. Indices are not backfilled on creation; call
/// [`Index::rebuild_index`] to populate one from existing records.
#[derive(Debug)]
pub struct Table<T> {
    core: Arc<TableCore<T>>,
    exprs: Arc<ExprCache>,
    indices: Mutex<Vec<Arc<Index<T>>>>,
    write_lock: Mutex<()>,
}

impl<T: Record> Table<T> {
    /// Open the table `name` as a child of `parent`
    pub fn open(
        parent: &StorageNode,
        name: &str,
        key_expr: &str,
        exprs: Arc<ExprCache>,
    ) -> Result<Self> {
        let storage = parent.add_child(name)?;
        let key_expr = exprs.get(key_expr)?;
        tracing::debug!("opened table {} (key: {})", name, key_expr);

        Ok(Self {
            core: Arc::new(TableCore {
                name: name.to_string(),
                storage,
                key_expr,
                _record: PhantomData,
            }),
            exprs,
            indices: Mutex::default(),
            write_lock: Mutex::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn key_expr(&self) -> &str {
        self.core.key_expr.as_str()
    }

    pub fn path(&self) -> &Path {
        self.core.storage.path()
    }

    pub fn storage(&self) -> &Arc<StorageNode> {
        &self.core.storage
    }

    /// Primary key of `record`, as used for its file name
    pub fn key_for(&self, record: &T) -> Result<String> {
        self.core.key_for(record)
    }

    // ========== Records ==========

    /// Write `record` under its primary key and update every index.
    ///
    /// Overwrites an existing record with the same key. If an index update
    /// fails the record stays written; repair with rebuild or vacuum.
    pub fn save(&self, record: &T) -> Result<String> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let key = self.key_for(record)?;
        self.core.storage.write(&key, &record.to_json()?)?;
        for index in self.index_handles() {
            index.put(record)?;
        }
        Ok(key)
    }

    /// Read the record stored under `key`
    pub fn fetch(&self, key: impl Display) -> Result<T> {
        let key = key.to_string();
        let text = self.core.storage.read(&key)?;
        T::from_json(&key, &text)
    }

    pub fn contains(&self, key: impl Display) -> bool {
        self.core.storage.contains(&key.to_string())
    }

    /// Lazily deserialize every stored record. Unordered.
    pub fn records(&self) -> Result<impl Iterator<Item = Result<T>>> {
        self.core.records()
    }

    /// Every stored record. Unordered.
    pub fn all(&self) -> Result<Vec<T>> {
        self.records()?.collect()
    }

    /// Primary keys of the stored records, from their file names
    pub fn keys(&self) -> Result<Vec<String>> {
        self.core.storage.names()?.collect()
    }

    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        for name in self.core.storage.names()? {
            name?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove `record` and its index links. Returns false if no document was stored.
    pub fn delete(&self, record: &T) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let key = self.key_for(record)?;
        let removed = self.core.storage.delete(&key)?;
        for index in self.index_handles() {
            index.delete(record)?;
        }
        Ok(removed)
    }

    /// Delete by primary key. The stored record is read first so its index
    /// links can be found.
    pub fn delete_key(&self, key: impl Display) -> Result<bool> {
        match self.fetch(key) {
            Ok(record) => self.delete(&record),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ========== Indices ==========

    fn index_handles(&self) -> Vec<Arc<Index<T>>> {
        self.indices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get or create the index for `expr`. A new index starts empty.
    pub fn index(&self, expr: &str) -> Result<Arc<Index<T>>> {
        let mut indices = self.indices.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = indices.iter().find(|index| index.expression() == expr) {
            return Ok(Arc::clone(index));
        }

        let compiled = self.exprs.get(expr)?;
        let index = Arc::new(Index::open(Arc::clone(&self.core), compiled)?);
        tracing::debug!("attached index {} to table {}", expr, self.name());
        indices.push(Arc::clone(&index));
        Ok(index)
    }

    /// Expressions of the attached indices, in registration order
    pub fn indices(&self) -> Vec<String> {
        self.index_handles()
            .iter()
            .map(|index| index.expression().to_string())
            .collect()
    }

    /// Read-only diagnostic summary
    pub fn stat(&self) -> Result<TableStat> {
        Ok(TableStat {
            path: self.path().to_path_buf(),
            record_type: self.name().to_string(),
            key_expr: self.key_expr().to_string(),
            num_records: self.len()?,
            indices: self.indices(),
        })
    }
}

/// Table diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStat {
    pub path: PathBuf,
    pub record_type: String,
    pub key_expr: String,
    pub num_records: usize,
    pub indices: Vec<String>,
}

impl std::fmt::Display for TableStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Table {}:", self.record_type)?;
        writeln!(f, "  Path: {}", self.path.display())?;
        writeln!(f, "  Key: {}", self.key_expr)?;
        writeln!(f, "  Records: {}", self.num_records)?;
        writeln!(f, "  Indices: {}", self.indices.join(", "))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::Error;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestModel {
        id: u32,
        name: String,
        email: String,
    }

    impl Record for TestModel {}

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PersonModel {
        id: String,
        first_name: String,
        last_name: String,
        age: u32,
    }

    impl Record for PersonModel {}

    fn model(id: u32, name: &str) -> TestModel {
        TestModel {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    fn person() -> PersonModel {
        PersonModel {
            id: "abc123".into(),
            first_name: "Jane".into(),
            last_name: "Smith".into(),
            age: 30,
        }
    }

    fn setup() -> (TempDir, StorageNode, Table<TestModel>) {
        let dir = TempDir::new().unwrap();
        let root = StorageNode::open(dir.path().join("db")).unwrap();
        let table = Table::open(&root, "TestModel", "id", Arc::new(ExprCache::new())).unwrap();
        (dir, root, table)
    }

    fn sorted_keys<T: Record>(table: &Table<T>) -> Vec<String> {
        let mut keys = table.keys().unwrap();
        keys.sort();
        keys
    }

    #[test]
    fn test_open_creates_directory() {
        let (_dir, root, table) = setup();
        assert_eq!(table.path(), root.path().join("TestModel"));
        assert!(table.path().is_dir());
        assert_eq!(table.key_expr(), "id");
        assert!(table.indices().is_empty());
    }

    #[test]
    fn test_key_for() {
        let (_dir, root, table) = setup();
        assert_eq!(table.key_for(&model(123, "John")).unwrap(), "123");

        let exprs = Arc::new(ExprCache::new());
        let people: Table<PersonModel> = Table::open(&root, "PersonModel", "id", Arc::clone(&exprs)).unwrap();
        assert_eq!(people.key_for(&person()).unwrap(), "abc123");

        let by_name: Table<PersonModel> = Table::open(&root, "ByName", "first_name", exprs).unwrap();
        assert_eq!(by_name.key_for(&person()).unwrap(), "Jane");
    }

    #[test]
    fn test_save_and_fetch() {
        let (_dir, _root, table) = setup();
        let record = model(123, "John");
        assert_eq!(table.save(&record).unwrap(), "123");
        assert!(table.path().join("123.json").is_file());
        assert_eq!(table.fetch(123).unwrap(), record);
        assert_eq!(table.fetch("123").unwrap(), record);
    }

    #[test]
    fn test_fetch_missing_record() {
        let (_dir, _root, table) = setup();
        assert!(matches!(table.fetch("999"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_fetch_invalid_content() {
        let (_dir, _root, table) = setup();
        std::fs::write(table.path().join("5.json"), r#"{"id": "five"}"#).unwrap();
        assert!(matches!(table.fetch(5), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_all_and_keys() {
        let (_dir, _root, table) = setup();
        for (id, name) in [(1, "Alice"), (2, "Bob"), (3, "Charlie")] {
            table.save(&model(id, name)).unwrap();
        }

        let mut names: Vec<String> = table.all().unwrap().into_iter().map(|r| r.name).collect();
        names.sort();
        assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
        assert_eq!(sorted_keys(&table), vec!["1", "2", "3"]);
        assert_eq!(table.len().unwrap(), 3);
    }

    #[test]
    fn test_save_overwrites_existing_record() {
        let (_dir, _root, table) = setup();
        table.save(&model(1, "Alice")).unwrap();
        let updated = TestModel {
            id: 1,
            name: "Alice Updated".into(),
            email: "alice.new@example.com".into(),
        };
        table.save(&updated).unwrap();

        assert_eq!(table.keys().unwrap(), vec!["1"]);
        assert_eq!(table.fetch(1).unwrap(), updated);
    }

    #[test]
    fn test_delete() {
        let (_dir, _root, table) = setup();
        let record = model(1, "Alice");
        table.save(&record).unwrap();
        assert!(table.delete(&record).unwrap());
        assert!(table.keys().unwrap().is_empty());
        assert!(!table.delete(&record).unwrap());
    }

    #[test]
    fn test_delete_key() {
        let (_dir, _root, table) = setup();
        table.save(&model(4, "Dana")).unwrap();
        assert!(table.delete_key(4).unwrap());
        assert!(!table.contains(4));
        assert!(!table.delete_key(4).unwrap());
    }

    #[test]
    fn test_index_memoized_and_not_backfilled() {
        let (_dir, _root, table) = setup();
        table.save(&model(1, "Alice")).unwrap();

        let a = table.index("name").unwrap();
        let b = table.index("name").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.indices(), vec!["name"]);
        assert!(a.path().is_dir());
        assert!(a.get("Alice").unwrap().is_empty());
    }

    #[test]
    fn test_save_updates_indices() {
        let (_dir, _root, table) = setup();
        let index = table.index("name").unwrap();
        table.save(&model(1, "Alice")).unwrap();

        let link = index.path().join("Alice").join("1.json");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(index.get("Alice").unwrap(), vec![model(1, "Alice")]);
    }

    #[test]
    fn test_delete_removes_from_indices() {
        let (_dir, _root, table) = setup();
        let index = table.index("name").unwrap();
        let record = model(1, "Alice");
        table.save(&record).unwrap();
        table.delete(&record).unwrap();

        assert!(index.get("Alice").unwrap().is_empty());
        assert!(!index.path().join("Alice").exists());
    }

    #[test]
    fn test_every_index_receives_mutations() {
        let (_dir, _root, table) = setup();
        let by_name = table.index("name").unwrap();
        let by_email = table.index("email").unwrap();
        table.save(&model(2, "Bob")).unwrap();

        assert_eq!(table.indices(), vec!["name", "email"]);
        assert_eq!(by_name.get("Bob").unwrap().len(), 1);
        assert_eq!(by_email.get("bob@example.com").unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_key_expression() {
        let dir = TempDir::new().unwrap();
        let root = StorageNode::open(dir.path()).unwrap();
        let result: Result<Table<TestModel>> = Table::open(&root, "T", "a..b", Arc::new(ExprCache::new()));
        assert!(matches!(result, Err(Error::InvalidExpression { .. })));
    }

    #[test]
    fn test_stat() {
        let (_dir, _root, table) = setup();
        table.save(&model(1, "Alice")).unwrap();
        table.save(&model(2, "Bob")).unwrap();
        table.index("name").unwrap();

        let stat = table.stat().unwrap();
        assert_eq!(stat.path, table.path());
        assert_eq!(stat.record_type, "TestModel");
        assert_eq!(stat.key_expr, "id");
        assert_eq!(stat.num_records, 2);
        assert_eq!(stat.indices, vec!["name"]);
        assert!(stat.to_string().contains("Records: 2"));
    }
}
