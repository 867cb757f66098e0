#![allow(dead_code)]

use hyperhook_core::{Database, Value, props};
use hyperhook_db::{ClassDef, MemoryStorage, PropKind, Schema, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn tracker_schema() -> Schema {
    let link = |target: &str| PropKind::Link(target.to_string());
    let multi = |target: &str| PropKind::Multilink(target.to_string());
    Schema::new()
        .with_class(
            "status",
            ClassDef::new()
                .with_key("name")
                .with_prop("name", PropKind::String)
                .with_prop("order", PropKind::Number),
        )
        .with_class(
            "user",
            ClassDef::new()
                .with_key("username")
                .with_prop("username", PropKind::String)
                .with_prop("address", PropKind::String),
        )
        .with_class(
            "keyword",
            ClassDef::new()
                .with_key("name")
                .with_prop("name", PropKind::String),
        )
        .with_class(
            "msg",
            ClassDef::new()
                .with_prop("content", PropKind::String)
                .with_prop("author", link("user"))
                .with_prop("recipients", multi("user"))
                .with_prop("tx_Source", PropKind::String),
        )
        .with_class(
            "file",
            ClassDef::new()
                .with_prop("name", PropKind::String)
                .with_prop("type", PropKind::String),
        )
        .with_class(
            "issue",
            ClassDef::new()
                .with_prop("title", PropKind::String)
                .with_prop("status", link("status"))
                .with_prop("assignedto", link("user"))
                .with_prop("messages", multi("msg"))
                .with_prop("files", multi("file"))
                .with_prop("nosy", multi("user"))
                .with_prop("keywords", multi("keyword"))
                .with_prop("tx_Source", PropKind::String),
        )
}

/// A database with statuses (unread=1, chatting=2, resolved=3), users
/// (admin=1, alice=2, bob=3) and the `patch` keyword, committed with no
/// hooks registered.
pub fn seeded_db() -> (Database, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let mut db = Database::new(
        Arc::new(tracker_schema()),
        Arc::clone(&storage) as Arc<dyn Storage>,
    );
    for (name, order) in [("unread", 1.0), ("chatting", 2.0), ("resolved", 3.0)] {
        db.create("status", props([("name", Value::from(name)), ("order", Value::from(order))]))
            .expect("status should be created");
    }
    for name in ["admin", "alice", "bob"] {
        db.create("user", props([("username", name)]))
            .expect("user should be created");
    }
    db.create("keyword", props([("name", "patch")]))
        .expect("keyword should be created");
    db.commit().expect("seed commit should succeed");
    (db, storage)
}

pub struct TempDirGuard(pub PathBuf);

impl TempDirGuard {
    pub fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "hyperhook-core-{prefix}-{}-{unique}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("temp dir should be created");
        Self(path)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
