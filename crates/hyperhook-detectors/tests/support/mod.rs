#![allow(dead_code)]

use hyperhook_core::{Database, TrackerConfig, Value, props};
use hyperhook_db::{ClassDef, MemoryStorage, PropKind, Schema, Storage};
use hyperhook_detectors::standard_catalog;
use std::sync::Arc;

pub fn classic_schema() -> Schema {
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
                .with_prop("username", PropKind::String),
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

/// Statuses unread=1, chatting=2, resolved=3, done-cbb=4, closed=5; users
/// admin=1, alice=2, bob=3; keyword patch=1. No detectors are registered.
pub fn classic_db(config: TrackerConfig) -> Database {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut db = Database::open(Arc::new(classic_schema()), storage, Arc::new(config));
    let states = ["unread", "chatting", "resolved", "done-cbb", "closed"];
    for (order, name) in states.into_iter().enumerate() {
        db.create(
            "status",
            props([("name", Value::from(name)), ("order", Value::from(order as f64))]),
        )
        .expect("status should be created");
    }
    for name in ["admin", "alice", "bob"] {
        db.create("user", props([("username", name)]))
            .expect("user should be created");
    }
    db.create("keyword", props([("name", "patch")]))
        .expect("keyword should be created");
    db.commit().expect("seed commit should succeed");
    db
}

/// [`classic_db`] with the named catalog detectors registered in order.
pub fn db_with(config: TrackerConfig, detectors: &[&str]) -> Database {
    let mut db = classic_db(config);
    let catalog = standard_catalog();
    for name in detectors {
        catalog
            .register(name, &mut db)
            .expect("detector should register");
    }
    db
}

pub fn message(db: &mut Database, author: &str, content: &str) -> String {
    db.create("msg", props([("author", author), ("content", content)]))
        .expect("message should be created")
}

pub fn ids(db: &Database, class: &str, nodeid: &str, prop: &str) -> Vec<String> {
    db.get(class, nodeid, prop)
        .expect("property should be readable")
        .to_list()
}
