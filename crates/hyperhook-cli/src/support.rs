use hyperhook_core::{Database, DbError, PropMap, Session, Tracker, TxSource, Value};
use hyperhook_db::{ClassDef, PropKind, Schema};
use serde_json::{Map, json};
use std::fmt::Display;

/// Implicit properties shown next to the schema properties.
const STAMP_PROPS: [&str; 4] = ["creation", "activity", "creator", "actor"];

pub fn fail(message: impl Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn open_tracker_or_exit(home: &str) -> Tracker {
    Tracker::open(home).unwrap_or_else(|e| fail(format!("failed to open tracker {home}: {e}")))
}

/// Every CLI transaction is stamped with the `cli` source.
pub fn cli_session(uid: Option<String>) -> Session {
    Session {
        uid,
        source: Some(TxSource::Cli),
    }
}

/// Parse `prop=value` arguments against the class schema.
///
/// Multilinks split on commas, numbers and booleans are parsed, an empty
/// value unsets the property. Unknown properties pass through as strings
/// so the database reports them.
pub fn parse_assignments(
    schema: &Schema,
    class: &str,
    assignments: &[String],
) -> Result<PropMap, String> {
    let def = schema
        .class(class)
        .ok_or_else(|| format!("unknown class {class:?}"))?;
    let mut props = PropMap::new();
    for assignment in assignments {
        let (prop, raw) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected prop=value, got {assignment:?}"))?;
        let value = match def.prop(prop) {
            Some(kind) => parse_value(kind, raw).map_err(|e| format!("{class}.{prop}: {e}"))?,
            None => Value::from(raw),
        };
        props.insert(prop.to_string(), value);
    }
    Ok(props)
}

fn parse_value(kind: &PropKind, raw: &str) -> Result<Value, String> {
    let value = match kind {
        PropKind::Multilink(_) => Value::List(split_list(raw)),
        _ if raw.is_empty() => Value::Null,
        PropKind::Integer => Value::Integer(
            raw.parse()
                .map_err(|_| format!("{raw:?} is not an integer"))?,
        ),
        PropKind::Number => Value::Number(
            raw.parse()
                .map_err(|_| format!("{raw:?} is not a number"))?,
        ),
        PropKind::Boolean => match raw {
            "true" | "yes" | "1" => Value::Bool(true),
            "false" | "no" | "0" => Value::Bool(false),
            _ => return Err(format!("{raw:?} is not a boolean")),
        },
        _ => Value::from(raw),
    };
    Ok(value)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `prop=v1,v2` filter arguments.
pub fn parse_filters(args: &[String]) -> Result<Vec<(String, Vec<String>)>, String> {
    args.iter()
        .map(|arg| {
            let (prop, raw) = arg
                .split_once('=')
                .ok_or_else(|| format!("expected prop=values, got {arg:?}"))?;
            Ok((prop.to_string(), split_list(raw)))
        })
        .collect()
}

/// All schema properties of a node plus its stamps, as JSON.
pub fn node_json(db: &Database, class: &str, id: &str) -> Result<serde_json::Value, DbError> {
    let def = db.reader().class(class)?;
    let mut out = Map::new();
    out.insert("id".to_string(), json!(id));
    for prop in def.properties.keys() {
        out.insert(prop.clone(), json!(db.get(class, id, prop)?));
    }
    for prop in STAMP_PROPS {
        out.insert(prop.to_string(), json!(db.get(class, id, prop)?));
    }
    out.insert("retired".to_string(), json!(db.is_retired(class, id)?));
    Ok(serde_json::Value::Object(out))
}

/// The schema `init` installs when none is given.
pub fn classic_schema() -> Schema {
    let link = |target: &str| PropKind::Link(target.to_string());
    let multi = |target: &str| PropKind::Multilink(target.to_string());
    let named = || {
        ClassDef::new()
            .with_key("name")
            .with_prop("name", PropKind::String)
            .with_prop("order", PropKind::Number)
    };
    Schema::new()
        .with_class("status", named())
        .with_class("priority", named())
        .with_class(
            "keyword",
            ClassDef::new()
                .with_key("name")
                .with_prop("name", PropKind::String),
        )
        .with_class(
            "user",
            ClassDef::new()
                .with_key("username")
                .with_prop("username", PropKind::String)
                .with_prop("realname", PropKind::String)
                .with_prop("address", PropKind::String)
                .with_prop("password", PropKind::Password),
        )
        .with_class(
            "msg",
            ClassDef::new()
                .with_prop("content", PropKind::String)
                .with_prop("author", link("user"))
                .with_prop("recipients", multi("user"))
                .with_prop("date", PropKind::Date)
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
                .with_prop("priority", link("priority"))
                .with_prop("assignedto", link("user"))
                .with_prop("messages", multi("msg"))
                .with_prop("files", multi("file"))
                .with_prop("nosy", multi("user"))
                .with_prop("keywords", multi("keyword"))
                .with_prop("superseder", multi("issue"))
                .with_prop("tx_Source", PropKind::String),
        )
}

pub const CLASSIC_STATUSES: [&str; 8] = [
    "unread",
    "deferred",
    "chatting",
    "need-eg",
    "in-progress",
    "testing",
    "done-cbb",
    "resolved",
];

pub const CLASSIC_PRIORITIES: [&str; 5] = ["critical", "urgent", "bug", "feature", "wish"];
