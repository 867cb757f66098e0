//! The seam between the dispatch core and a persistence backend.

use crate::journal::JournalEntry;
use crate::jsonl::JsonlError;
use crate::node::Node;
use crate::value::PropMap;
use chrono::{DateTime, Utc};

/// Raw node storage.
///
/// Implementations serialize individual calls; the dispatcher never holds
/// a storage lock while hooks run. Methods take `&self` so one storage can be
/// shared by several database handles.
pub trait Storage: Send + Sync {
    /// Allocate the next id for `class` (`"1"`, `"2"`, ...).
    fn allocate_id(&self, class: &str) -> Result<String, StorageError>;

    /// Insert a freshly created node.
    fn insert(&self, node: Node) -> Result<(), StorageError>;

    /// Fetch a node, retired or not.
    fn node(&self, class: &str, id: &str) -> Result<Option<Node>, StorageError>;

    /// Overwrite properties and stamp `activity`/`actor`.
    fn update(
        &self,
        class: &str,
        id: &str,
        changes: &PropMap,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    fn set_retired(
        &self,
        class: &str,
        id: &str,
        retired: bool,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Overwrite a stored node with `node` as given, stamps included.
    fn replace(&self, node: Node) -> Result<(), StorageError>;

    /// Delete a node outright. Only used to undo an uncommitted create.
    fn remove(&self, class: &str, id: &str) -> Result<Node, StorageError>;

    /// Every id of `class`, retired included, in numeric order.
    fn ids(&self, class: &str) -> Result<Vec<String>, StorageError>;

    fn append_journal(&self, entries: Vec<JournalEntry>) -> Result<(), StorageError>;

    /// Journal entries for one node, oldest first.
    fn journal(&self, class: &str, id: &str) -> Result<Vec<JournalEntry>, StorageError>;
}

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error("{class}{id} does not exist")]
    NodeNotFound { class: String, id: String },

    #[error("{class}{id} already exists")]
    NodeExists { class: String, id: String },

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage backend error: {0}")]
    Backend(String),
}
