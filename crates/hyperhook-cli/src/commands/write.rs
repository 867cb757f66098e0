//! Mutating commands. Each runs as one tracker transaction with every
//! enabled detector loaded.

use crate::support::{cli_session, fail, open_tracker_or_exit, parse_assignments};
use hyperhook_core::{Database, DbError, PropMap, Tracker};
use hyperhook_detectors::standard_catalog;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct Target {
    pub home: String,
    pub uid: Option<String>,
    pub json: bool,
}

pub fn run_create(target: Target, class: String, assignments: Vec<String>) {
    let tracker = open_tracker_or_exit(&target.home);
    let props = assignments_or_exit(&tracker, &class, &assignments);
    let id = transact_or_exit(&tracker, &target, |db| db.create(&class, props));
    report(&target, "create", &class, &id);
}

pub fn run_set(target: Target, class: String, id: String, assignments: Vec<String>) {
    let tracker = open_tracker_or_exit(&target.home);
    let props = assignments_or_exit(&tracker, &class, &assignments);
    transact_or_exit(&tracker, &target, |db| db.set(&class, &id, props));
    report(&target, "set", &class, &id);
}

pub fn run_retire(target: Target, class: String, id: String) {
    let tracker = open_tracker_or_exit(&target.home);
    transact_or_exit(&tracker, &target, |db| db.retire(&class, &id));
    report(&target, "retire", &class, &id);
}

pub fn run_restore(target: Target, class: String, id: String) {
    let tracker = open_tracker_or_exit(&target.home);
    transact_or_exit(&tracker, &target, |db| db.restore(&class, &id));
    report(&target, "restore", &class, &id);
}

fn assignments_or_exit(tracker: &Tracker, class: &str, assignments: &[String]) -> PropMap {
    parse_assignments(tracker.schema(), class, assignments).unwrap_or_else(|e| fail(e))
}

fn transact_or_exit<T, F>(tracker: &Tracker, target: &Target, f: F) -> T
where
    F: FnOnce(&mut Database) -> Result<T, DbError>,
{
    tracker
        .transact(&standard_catalog(), &cli_session(target.uid.clone()), f)
        .unwrap_or_else(|e| fail(e))
}

fn report(target: &Target, action: &str, class: &str, id: &str) {
    tracing::info!(
        home = %target.home,
        uid = ?target.uid,
        action,
        class,
        id,
        "committed"
    );
    if target.json {
        let payload = json!({
            "action": action,
            "class": class,
            "id": id,
            "designator": format!("{class}{id}"),
        });
        println!("{payload}");
    } else {
        println!("{action} {class}{id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("buffer lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn report_logs_the_committed_write() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let target = Target {
            home: "tracker".to_string(),
            uid: Some("3".to_string()),
            json: true,
        };

        tracing::subscriber::with_default(subscriber, || report(&target, "set", "issue", "7"));

        let logged = String::from_utf8(captured.0.lock().expect("buffer lock").clone())
            .expect("log output should be UTF-8");
        assert!(logged.contains("committed"));
        assert!(logged.contains("action=\"set\""));
        assert!(logged.contains("class=\"issue\""));
        assert!(logged.contains("uid=Some(\"3\")"));
    }
}
