//! Storage Layer - the filesystem is the storage engine
//!
//! - `StorageNode`: one directory holding `<name>.<ext>` documents plus named child nodes
//! - `link`: the link primitive secondary indices are built from

pub mod link;
pub mod node;

pub use node::{StorageNode, DEFAULT_EXTENSION, validate_name};
