//! In-memory reference storage with JSONL persistence.
//!
//! One mutex guards all state; every trait call takes it once and releases
//! it before returning.

use crate::journal::JournalEntry;
use crate::jsonl::{read_records_from_path, write_records_to_path};
use crate::node::{Node, id_order};
use crate::storage::{Storage, StorageError};
use crate::value::PropMap;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Node records file inside a database directory.
pub const NODES_FILE: &str = "nodes.jsonl";
/// Journal file inside a database directory.
pub const JOURNAL_FILE: &str = "journal.jsonl";

#[derive(Debug, Clone, Default)]
struct MemoryState {
    nodes: BTreeMap<String, BTreeMap<String, Node>>,
    counters: BTreeMap<String, u64>,
    journal: Vec<JournalEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build storage from materialized nodes and journal.
    ///
    /// Duplicate (class, id) pairs resolve last-write-wins. Id counters
    /// resume after the highest numeric id seen per class.
    pub fn from_records(nodes: Vec<Node>, journal: Vec<JournalEntry>) -> Self {
        let mut state = MemoryState {
            journal,
            ..MemoryState::default()
        };
        for node in nodes {
            if let Ok(n) = node.id.parse::<u64>() {
                let counter = state.counters.entry(node.class.clone()).or_default();
                *counter = (*counter).max(n);
            }
            state
                .nodes
                .entry(node.class.clone())
                .or_default()
                .insert(node.id.clone(), node);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Load `nodes.jsonl` and `journal.jsonl` from `dir`. Missing files read
    /// as empty.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        let nodes_path = dir.join(NODES_FILE);
        let journal_path = dir.join(JOURNAL_FILE);
        let nodes = if nodes_path.exists() {
            read_records_from_path(&nodes_path)?
        } else {
            Vec::new()
        };
        let journal = if journal_path.exists() {
            read_records_from_path(&journal_path)?
        } else {
            Vec::new()
        };
        tracing::debug!(
            dir = %dir.display(),
            nodes = nodes.len(),
            journal = journal.len(),
            "loaded memory storage"
        );
        Ok(Self::from_records(nodes, journal))
    }

    /// Persist both files into `dir`, replacing them atomically.
    pub fn save_dir(&self, dir: impl AsRef<Path>) -> Result<(), StorageError> {
        let dir = dir.as_ref();
        let (nodes, journal) = {
            let state = self.lock()?;
            let nodes: Vec<Node> = state
                .nodes
                .values()
                .flat_map(|by_id| by_id.values().cloned())
                .collect();
            (nodes, state.journal.clone())
        };
        write_records_to_path(dir.join(NODES_FILE), &nodes)?;
        write_records_to_path(dir.join(JOURNAL_FILE), &journal)?;
        Ok(())
    }

    /// Total node count across classes.
    pub fn len(&self) -> usize {
        self.lock()
            .map(|state| state.nodes.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Poisoned)
    }
}

fn not_found(class: &str, id: &str) -> StorageError {
    StorageError::NodeNotFound {
        class: class.to_string(),
        id: id.to_string(),
    }
}

impl Storage for MemoryStorage {
    fn allocate_id(&self, class: &str) -> Result<String, StorageError> {
        let mut state = self.lock()?;
        let counter = state.counters.entry(class.to_string()).or_default();
        *counter += 1;
        Ok(counter.to_string())
    }

    fn insert(&self, node: Node) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let by_id = state.nodes.entry(node.class.clone()).or_default();
        if by_id.contains_key(&node.id) {
            return Err(StorageError::NodeExists {
                class: node.class,
                id: node.id,
            });
        }
        by_id.insert(node.id.clone(), node);
        Ok(())
    }

    fn node(&self, class: &str, id: &str) -> Result<Option<Node>, StorageError> {
        let state = self.lock()?;
        Ok(state.nodes.get(class).and_then(|by_id| by_id.get(id)).cloned())
    }

    fn update(
        &self,
        class: &str,
        id: &str,
        changes: &PropMap,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let node = state
            .nodes
            .get_mut(class)
            .and_then(|by_id| by_id.get_mut(id))
            .ok_or_else(|| not_found(class, id))?;
        node.apply(changes, actor, at);
        Ok(())
    }

    fn set_retired(
        &self,
        class: &str,
        id: &str,
        retired: bool,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let node = state
            .nodes
            .get_mut(class)
            .and_then(|by_id| by_id.get_mut(id))
            .ok_or_else(|| not_found(class, id))?;
        node.retired = retired;
        node.touch(actor, at);
        Ok(())
    }

    fn replace(&self, node: Node) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let slot = state
            .nodes
            .get_mut(&node.class)
            .and_then(|by_id| by_id.get_mut(&node.id))
            .ok_or_else(|| not_found(&node.class, &node.id))?;
        *slot = node;
        Ok(())
    }

    fn remove(&self, class: &str, id: &str) -> Result<Node, StorageError> {
        let mut state = self.lock()?;
        state
            .nodes
            .get_mut(class)
            .and_then(|by_id| by_id.remove(id))
            .ok_or_else(|| not_found(class, id))
    }

    fn ids(&self, class: &str) -> Result<Vec<String>, StorageError> {
        let state = self.lock()?;
        let mut ids: Vec<String> = state
            .nodes
            .get(class)
            .map(|by_id| by_id.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort_by(|a, b| id_order(a, b));
        Ok(ids)
    }

    fn append_journal(&self, entries: Vec<JournalEntry>) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.journal.extend(entries);
        Ok(())
    }

    fn journal(&self, class: &str, id: &str) -> Result<Vec<JournalEntry>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .journal
            .iter()
            .filter(|entry| entry.class == class && entry.nodeid == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JournalAction;
    use crate::value::{Value, props};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct TempDirGuard(PathBuf);

    impl TempDirGuard {
        fn new(prefix: &str) -> Self {
            let unique = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock should be after unix epoch")
                .as_nanos();
            let path = std::env::temp_dir().join(format!(
                "hyperhook-memory-{prefix}-{}-{unique}",
                std::process::id()
            ));
            std::fs::create_dir_all(&path).expect("temp dir should be created");
            Self(path)
        }
    }

    impl Drop for TempDirGuard {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn entry(class: &str, nodeid: &str, action: JournalAction) -> JournalEntry {
        JournalEntry {
            tx_id: "tx-1".to_string(),
            class: class.to_string(),
            nodeid: nodeid.to_string(),
            action,
            changes: PropMap::new(),
            actor: "1".to_string(),
            source: Some("cli".to_string()),
            at: Utc::now(),
        }
    }

    #[test]
    fn ids_are_allocated_per_class() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.allocate_id("issue").expect("id"), "1");
        assert_eq!(storage.allocate_id("issue").expect("id"), "2");
        assert_eq!(storage.allocate_id("msg").expect("id"), "1");
    }

    #[test]
    fn update_overwrites_and_stamps_actor() {
        let storage = MemoryStorage::new();
        let created = Utc::now();
        storage
            .insert(Node::new("issue", "1", props([("title", "a")]), "2", created))
            .expect("insert should succeed");
        storage
            .update("issue", "1", &props([("title", "b")]), "5", Utc::now())
            .expect("update should succeed");

        let node = storage
            .node("issue", "1")
            .expect("read should succeed")
            .expect("node should exist");
        assert_eq!(node.props.get("title"), Some(&Value::from("b")));
        assert_eq!(node.creator, "2");
        assert_eq!(node.actor, "5");

        let missing = storage.update("issue", "9", &PropMap::new(), "5", Utc::now());
        assert!(matches!(missing, Err(StorageError::NodeNotFound { .. })));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let storage = MemoryStorage::new();
        let node = Node::new("issue", "1", PropMap::new(), "1", Utc::now());
        storage.insert(node.clone()).expect("first insert");
        assert!(matches!(
            storage.insert(node),
            Err(StorageError::NodeExists { .. })
        ));
    }

    #[test]
    fn replace_and_remove_restore_earlier_records() {
        let storage = MemoryStorage::new();
        let before = Node::new("issue", "1", props([("title", "a")]), "2", Utc::now());
        storage.insert(before.clone()).expect("insert");
        storage
            .update("issue", "1", &props([("title", "b")]), "5", Utc::now())
            .expect("update");

        storage.replace(before.clone()).expect("replace");
        assert_eq!(storage.node("issue", "1").expect("read"), Some(before));

        let removed = storage.remove("issue", "1").expect("remove");
        assert_eq!(removed.id, "1");
        assert!(storage.is_empty());
        assert!(matches!(
            storage.remove("issue", "1"),
            Err(StorageError::NodeNotFound { .. })
        ));
        assert!(matches!(
            storage.replace(removed),
            Err(StorageError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn save_and_load_round_trip_resumes_counters() {
        let dir = TempDirGuard::new("roundtrip");
        let storage = MemoryStorage::new();
        for _ in 0..3 {
            let id = storage.allocate_id("issue").expect("id");
            storage
                .insert(Node::new("issue", id.clone(), props([("title", id)]), "1", Utc::now()))
                .expect("insert");
        }
        storage
            .set_retired("issue", "2", true, "1", Utc::now())
            .expect("retire");
        storage
            .append_journal(vec![
                entry("issue", "1", JournalAction::Create),
                entry("issue", "2", JournalAction::Retire),
            ])
            .expect("journal");
        storage.save_dir(&dir.0).expect("save should succeed");

        let loaded = MemoryStorage::load_dir(&dir.0).expect("load should succeed");
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.ids("issue").expect("ids"), vec!["1", "2", "3"]);
        assert!(
            loaded
                .node("issue", "2")
                .expect("read")
                .expect("node")
                .retired
        );
        assert_eq!(loaded.allocate_id("issue").expect("id"), "4");
        assert_eq!(loaded.journal("issue", "2").expect("journal").len(), 1);
    }

    #[test]
    fn missing_directory_loads_empty() {
        let dir = TempDirGuard::new("empty");
        let storage = MemoryStorage::load_dir(dir.0.join("db")).expect("load should succeed");
        assert!(storage.is_empty());
    }
}
