//! # NonDB - Filesystem-native document store
//!
//! A directory is a table, a file is a record, and a secondary index is a
//! directory tree of symbolic links pointing back at the records.
//!
//! NonDB provides:
//! - `StorageNode`: a directory with a document extension and memoized children
//! - `Table`: typed record CRUD keyed by a primary key-expression
//! - `Index`: derived-key lookups maintained as link trees, with rebuild and vacuum
//! - `NonDb`: the registry that owns the root and hands out tables
//!
//! ```text
//! <root>/<Schema>/<pk>.json
//! <root>/<Schema>/_index@<expr>/<index_key>/<pk>.json  -> ../../<pk>.json
//! ```

pub mod config;
pub mod db;
pub mod expr;
pub mod index;
pub mod output;
pub mod record;
pub mod storage;
pub mod table;
pub mod ui;

// Re-exports for convenient access
pub use db::{NonDb, Options};
pub use expr::{ExprCache, KeyExpr};
pub use index::{Index, VacuumReport};
pub use record::Record;
pub use storage::StorageNode;
pub use table::{Table, TableStat};

use std::path::PathBuf;

/// Result type alias for NonDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for NonDB operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Validation failed for {name}: {source}")]
    Validation {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Invalid expression `{expr}`: {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Table {name} is already open with record type {existing}")]
    SchemaMismatch { name: String, existing: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the "document or table does not exist" class of errors
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
