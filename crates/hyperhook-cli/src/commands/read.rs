use crate::support::{fail, node_json, open_tracker_or_exit, parse_filters};
use hyperhook_core::{Database, DbError, Tracker};
use serde_json::json;

fn inspect_or_exit<T, F>(tracker: &Tracker, f: F) -> T
where
    F: FnOnce(&Database) -> Result<T, DbError>,
{
    tracker.inspect(f).unwrap_or_else(|e| fail(e))
}

pub fn run_get(home: String, class: String, id: String, prop: Option<String>, json_output: bool) {
    let tracker = open_tracker_or_exit(&home);
    match prop {
        Some(prop) => {
            let value = inspect_or_exit(&tracker, |db| db.get(&class, &id, &prop));
            if json_output {
                println!("{}", json!(value));
            } else {
                println!("{value}");
            }
        }
        None => {
            let node = inspect_or_exit(&tracker, |db| node_json(db, &class, &id));
            if json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&node).unwrap_or_else(|e| fail(e))
                );
                return;
            }
            println!("{class}{id}");
            if let Some(fields) = node.as_object() {
                for (prop, value) in fields {
                    if prop == "id" {
                        continue;
                    }
                    println!("  {prop}: {}", display_json(value));
                }
            }
        }
    }
}

pub fn run_list(home: String, class: String, json_output: bool) {
    let tracker = open_tracker_or_exit(&home);
    let ids = inspect_or_exit(&tracker, |db| db.list(&class));
    print_ids(&class, &ids, json_output);
}

pub fn run_filter(home: String, class: String, filters: Vec<String>, json_output: bool) {
    let tracker = open_tracker_or_exit(&home);
    let filters = parse_filters(&filters).unwrap_or_else(|e| fail(e));
    let ids = inspect_or_exit(&tracker, |db| db.filter(&class, &filters));
    print_ids(&class, &ids, json_output);
}

pub fn run_history(home: String, class: String, id: String, json_output: bool) {
    let tracker = open_tracker_or_exit(&home);
    let entries = inspect_or_exit(&tracker, |db| db.history(&class, &id));
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_else(|e| fail(e))
        );
        return;
    }

    println!("{class}{id}: {} journal entries", entries.len());
    for entry in &entries {
        let changes = if entry.changes.is_empty() {
            String::new()
        } else {
            format!(" {}", json!(entry.changes))
        };
        println!(
            "  {} {} by {} via {}{changes}",
            entry.at.to_rfc3339(),
            entry.action,
            entry.actor,
            entry.source.as_deref().unwrap_or("-"),
        );
    }
}

fn print_ids(class: &str, ids: &[String], json_output: bool) {
    if json_output {
        println!("{}", json!(ids));
        return;
    }
    for id in ids {
        println!("{class}{id}");
    }
}

fn display_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(display_json)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
