//! # hyperhook-db
//!
//! Storage substrate for the hyperhook dispatch core.
//!
//! This crate provides:
//! - `Value` / `PropMap` (property values)
//! - `Schema`, `ClassDef`, `PropKind` (classes and property kinds, TOML)
//! - `Node` (entity record with implicit properties)
//! - `Storage` (the seam real backends implement)
//! - `MemoryStorage` (reference backend with JSONL persistence)
//! - `JournalEntry` (per-node history)
//!
//! It knows nothing about hooks or transactions; those live in
//! `hyperhook-core`.
//!
//! ```text
//! db/nodes.jsonl, db/journal.jsonl (on disk)
//!     <->  load_dir / save_dir
//! MemoryStorage (mutex-guarded, shared behind Arc<dyn Storage>)
//! ```

pub mod journal;
pub mod jsonl;
pub mod memory;
pub mod node;
pub mod schema;
pub mod storage;
pub mod value;

pub use journal::{JournalAction, JournalEntry};
pub use jsonl::{
    JsonlError, read_records, read_records_from_path, write_records, write_records_to_path,
};
pub use memory::{JOURNAL_FILE, MemoryStorage, NODES_FILE};
pub use node::{Node, RESERVED_PROPS, id_order};
pub use schema::{ClassDef, PropKind, Schema, SchemaError};
pub use storage::{Storage, StorageError};
pub use value::{PropMap, Value, props};
