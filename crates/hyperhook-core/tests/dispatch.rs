mod support;

use hyperhook_core::{
    Database, DbError, DispatchOutcome, Event, HookError, OldValues, Operation, Reject,
    TrackerConfig, TxSource, Value, props,
};
use hyperhook_db::{JournalAction, PropMap, Storage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use support::{seeded_db, tracker_schema};

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().expect("log lock").clone()
}

fn push(log: &Log, line: impl Into<String>) {
    log.lock().expect("log lock").push(line.into());
}

#[test]
fn without_hooks_dispatch_is_a_direct_write() {
    let (mut db, storage) = seeded_db();
    let id = db
        .create("issue", props([("title", "crash on start")]))
        .expect("create should succeed");
    assert_eq!(id, "1");

    let node = storage
        .node("issue", &id)
        .expect("read should succeed")
        .expect("node should exist");
    assert_eq!(node.props.get("title"), Some(&Value::from("crash on start")));
    assert_eq!(node.props.get("status"), Some(&Value::Null));
    assert_eq!(node.props.get("nosy"), Some(&Value::List(Vec::new())));
    assert_eq!(node.creator, "1");
    assert_eq!(db.get("issue", &id, "actor").expect("actor"), Value::from("1"));

    db.set("issue", &id, props([("title", "crash on exit")]))
        .expect("set should succeed");
    assert_eq!(
        db.get("issue", &id, "title").expect("title"),
        Value::from("crash on exit")
    );
}

#[test]
fn auditors_run_in_order_on_the_accumulated_map() {
    let (mut db, _) = seeded_db();
    db.audit("issue", Event::Create, "first", |_, _, nodeid, newvalues| {
        assert!(nodeid.is_none());
        newvalues.set("title", "first");
        Ok(())
    })
    .expect("register first");
    db.audit("issue", Event::Create, "second", |_, _, _, newvalues| {
        let title = newvalues
            .get("title")
            .map(ToString::to_string)
            .unwrap_or_default();
        newvalues.set("title", format!("{title}+second"));
        newvalues.set("status", "chatting");
        Ok(())
    })
    .expect("register second");

    let id = db
        .create("issue", props([("title", "given")]))
        .expect("create should succeed");
    assert_eq!(
        db.get("issue", &id, "title").expect("title"),
        Value::from("first+second")
    );
    assert_eq!(db.get("issue", &id, "status").expect("status"), Value::from("2"));
}

#[test]
fn reject_leaves_storage_unchanged_and_skips_everything_after() {
    let (mut db, _) = seeded_db();
    let log = new_log();

    db.audit("issue", Event::Create, "gate", |_, _, _, newvalues| {
        if newvalues.get("title") == Some(&Value::from("spam")) {
            return Err(Reject::new("no spam please").into());
        }
        Ok(())
    })
    .expect("register gate");
    {
        let log = Arc::clone(&log);
        db.audit("issue", Event::Create, "after", move |_, _, _, _| {
            push(&log, "auditor");
            Ok(())
        })
        .expect("register after");
    }
    {
        let log = Arc::clone(&log);
        db.react("issue", Event::Create, "reactor", move |_, _, _, _| {
            push(&log, "reactor");
            Ok(())
        })
        .expect("register reactor");
    }

    match db.dispatch(Operation::create("issue", props([("title", "spam")]))) {
        DispatchOutcome::Rejected(reject) => {
            assert_eq!(reject.message, "no spam please");
            assert!(!reject.raw);
        }
        other => panic!("expected reject, got {other:?}"),
    }
    assert!(entries(&log).is_empty());
    assert!(db.list("issue").expect("list").is_empty());
    assert!(db.pending_journal().is_empty());

    // Create auditors run before id allocation, so the veto consumed no id.
    let id = db
        .create("issue", props([("title", "real")]))
        .expect("create should succeed");
    assert_eq!(id, "1");
    assert_eq!(entries(&log), vec!["auditor", "reactor"]);
}

#[test]
fn veto_undoes_writes_made_by_earlier_auditors() {
    let (mut db, storage) = seeded_db();
    let address_before = db.get("user", "2", "address").expect("address");

    db.audit("issue", Event::Create, "side", |db, _, _, _| {
        db.create("msg", props([("content", "written from an auditor")]))?;
        db.set("user", "2", props([("address", "alice@example.com")]))?;
        Ok(())
    })
    .expect("register side");
    db.audit("issue", Event::Create, "veto", |_, _, _, newvalues| {
        if newvalues.get("title") == Some(&Value::from("spam")) {
            return Err(Reject::new("no").into());
        }
        Err(HookError::failed("veto broke"))
    })
    .expect("register veto");

    let rejected = db.create("issue", props([("title", "spam")]));
    assert!(rejected.expect_err("create should be rejected").as_reject().is_some());
    let failed = db.create("issue", props([("title", "ham")]));
    assert!(matches!(failed, Err(DbError::Detector { .. })));

    assert!(storage.ids("msg").expect("msg ids").is_empty());
    assert_eq!(db.get("user", "2", "address").expect("address"), address_before);
    assert_eq!(db.get("user", "2", "actor").expect("actor"), Value::from("1"));
    assert!(db.list("issue").expect("list").is_empty());
    assert!(db.pending_journal().is_empty());
    assert_eq!(db.tx().uncommitted_writes(), 0);
}

#[test]
fn rollback_and_begin_discard_uncommitted_changes() {
    let (mut db, storage) = seeded_db();
    assert_eq!(db.rollback().expect("nothing to roll back"), 0);

    let id = db
        .create("issue", props([("title", "draft")]))
        .expect("create should succeed");
    db.set("issue", &id, props([("status", "chatting")]))
        .expect("set should succeed");
    db.retire("status", "3").expect("retire should succeed");
    assert_eq!(db.pending_journal().len(), 3);

    assert_eq!(db.rollback().expect("rollback should succeed"), 3);
    assert!(storage.ids("issue").expect("issue ids").is_empty());
    assert!(!db.is_retired("status", "3").expect("status exists"));
    assert!(db.pending_journal().is_empty());

    db.create("issue", props([("title", "kept")]))
        .expect("create should succeed");
    db.commit().expect("commit should succeed");
    db.create("issue", props([("title", "dropped")]))
        .expect("create should succeed");
    db.begin(Some(TxSource::Web)).expect("begin should succeed");

    let titles: Vec<Value> = db
        .list("issue")
        .expect("list")
        .iter()
        .map(|id| db.get("issue", id, "title").expect("title"))
        .collect();
    assert_eq!(titles, vec![Value::from("kept")]);
    assert_eq!(db.tx_source(), Some(TxSource::Web));
    assert_eq!(db.rollback().expect("committed work stays"), 0);
}

#[test]
fn reject_surfaces_through_the_result_api() {
    let (mut db, _) = seeded_db();
    db.audit("issue", Event::Create, "gate", |_, _, _, _| {
        Err(Reject::raw("<b>closed</b>").into())
    })
    .expect("register gate");

    let err = db
        .create("issue", props([("title", "x")]))
        .expect_err("create should be rejected");
    let reject = err.as_reject().expect("error should be a reject");
    assert_eq!(reject.message, "<b>closed</b>");
    assert!(reject.raw);
}

#[test]
fn idempotent_set_commits_nothing_and_fires_no_reactor() {
    let (mut db, storage) = seeded_db();
    let id = db
        .create(
            "issue",
            props([
                ("title", Value::from("same")),
                ("nosy", Value::from(vec!["2", "3"])),
            ]),
        )
        .expect("create should succeed");
    let before = storage
        .node("issue", &id)
        .expect("read")
        .expect("node should exist");

    let log = new_log();
    {
        let log = Arc::clone(&log);
        db.react("issue", Event::Set, "watch", move |_, _, _, _| {
            push(&log, "fired");
            Ok(())
        })
        .expect("register reactor");
    }

    let outcome = db.dispatch(Operation::set(
        "issue",
        id.clone(),
        props([
            ("title", Value::from("same")),
            ("nosy", Value::from(vec!["3", "2", "3"])),
        ]),
    ));
    assert!(matches!(outcome, DispatchOutcome::Unchanged { .. }));
    assert!(entries(&log).is_empty());

    let after = storage.node("issue", &id).expect("read").expect("node");
    assert_eq!(after, before);
    assert_eq!(db.pending_journal().len(), 1);
}

#[test]
fn set_oldvalues_hold_only_the_changed_properties() {
    let (mut db, _) = seeded_db();
    let id = db
        .create(
            "issue",
            props([("title", "old title"), ("status", "unread")]),
        )
        .expect("create should succeed");

    let seen: Arc<Mutex<Option<OldValues>>> = Arc::new(Mutex::new(None));
    {
        let seen = Arc::clone(&seen);
        db.react("issue", Event::Set, "capture", move |db, class, nodeid, old| {
            assert_eq!(
                db.get(class, nodeid, "title").expect("title"),
                Value::from("new title")
            );
            *seen.lock().expect("lock") = Some(old.clone());
            Ok(())
        })
        .expect("register reactor");
    }

    db.set(
        "issue",
        &id,
        props([("title", "new title"), ("status", "1")]),
    )
    .expect("set should succeed");

    let old = seen.lock().expect("lock").clone().expect("reactor should run");
    assert_eq!(
        old,
        OldValues::Changed(props([("title", "old title")]))
    );
}

#[test]
fn reactor_failures_are_swallowed_and_later_reactors_run() {
    let (mut db, _) = seeded_db();
    let log = new_log();
    db.react("issue", Event::Create, "broken", |_, _, _, _| {
        Err(HookError::failed("smtp server on fire"))
    })
    .expect("register broken");
    {
        let log = Arc::clone(&log);
        db.react("issue", Event::Create, "healthy", move |_, _, nodeid, old| {
            assert!(old.is_created());
            push(&log, format!("healthy {nodeid}"));
            Ok(())
        })
        .expect("register healthy");
    }

    let id = db
        .create("issue", props([("title", "x")]))
        .expect("reactor errors never fail the operation");
    assert_eq!(entries(&log), vec![format!("healthy {id}")]);
}

#[test]
fn auditor_failure_is_an_internal_error() {
    let (mut db, _) = seeded_db();
    db.audit("issue", Event::Create, "flaky", |_, _, _, _| {
        Err(HookError::failed("lookup table missing"))
    })
    .expect("register flaky");

    let err = db
        .create("issue", props([("title", "x")]))
        .expect_err("create should fail");
    match err {
        DbError::Detector {
            hook,
            class,
            event,
            message,
        } => {
            assert_eq!(hook, "flaky");
            assert_eq!(class, "issue");
            assert_eq!(event, Event::Create);
            assert_eq!(message, "lookup table missing");
        }
        other => panic!("expected detector error, got {other:?}"),
    }
    assert!(db.list("issue").expect("list").is_empty());
}

#[test]
fn cascaded_set_completes_before_the_next_reactor() {
    let (mut db, _) = seeded_db();
    let id = db
        .create("issue", props([("title", "x")]))
        .expect("create should succeed");
    let log = new_log();

    {
        let log = Arc::clone(&log);
        db.react("issue", Event::Set, "cascade", move |db, _, _, _| {
            push(&log, "cascade:before");
            db.set("user", "2", props([("address", "alice@example.com")]))?;
            push(&log, "cascade:after");
            Ok(())
        })
        .expect("register cascade");
    }
    {
        let log = Arc::clone(&log);
        db.react("issue", Event::Set, "second", move |_, _, _, _| {
            push(&log, "second");
            Ok(())
        })
        .expect("register second");
    }
    {
        let log = Arc::clone(&log);
        db.react("user", Event::Set, "user", move |db, _, _, _| {
            push(&log, format!("user depth={}", db.depth()));
            Ok(())
        })
        .expect("register user reactor");
    }

    db.set("issue", &id, props([("title", "y")]))
        .expect("set should succeed");
    assert_eq!(
        entries(&log),
        vec!["cascade:before", "user depth=2", "cascade:after", "second"]
    );
    assert_eq!(
        db.get("user", "2", "address").expect("address"),
        Value::from("alice@example.com")
    );
}

#[test]
fn tx_source_is_readable_but_locked_inside_hooks() {
    let (mut db, _) = seeded_db();
    let log = new_log();
    {
        let log = Arc::clone(&log);
        db.audit("issue", Event::Create, "probe", move |db, _, _, _| {
            let source = db.tx_source().map_or("none", TxSource::as_str);
            push(&log, format!("source={source}"));
            match db.set_tx_source(Some(TxSource::Email)) {
                Err(DbError::TxSourceLocked) => push(&log, "locked"),
                other => push(&log, format!("unexpected {other:?}")),
            }
            if let Err(DbError::DispatchInProgress(_)) = db.commit() {
                push(&log, "commit refused");
            }
            Ok(())
        })
        .expect("register probe");
    }

    db.set_tx_source(Some(TxSource::Web))
        .expect("front-end may stamp the source");
    db.create("issue", props([("title", "x")]))
        .expect("create should succeed");

    assert_eq!(
        entries(&log),
        vec!["source=web", "locked", "commit refused"]
    );
    assert_eq!(db.tx_source(), Some(TxSource::Web));
    let entry = db.pending_journal().last().expect("journal entry");
    assert_eq!(entry.source.as_deref(), Some("web"));
    assert_eq!(entry.action, JournalAction::Create);
}

#[test]
fn nesting_limit_stops_runaway_cascades() {
    let (seed, storage) = seeded_db();
    let mut config = TrackerConfig::default();
    config.dispatch.max_nesting = Some(1);
    let mut db = Database::open(
        seed.reader().shared_schema(),
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::new(config),
    );
    let id = db
        .create("issue", props([("title", "start")]))
        .expect("create should succeed");

    let calls = Arc::new(AtomicUsize::new(0));
    let errors = new_log();
    {
        let calls = Arc::clone(&calls);
        let errors = Arc::clone(&errors);
        db.react("issue", Event::Set, "echo", move |db, class, nodeid, _| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let result = db.set(class, nodeid, props([("title", format!("t{n}"))]));
            if let Err(err) = &result {
                push(&errors, err.to_string());
            }
            result.map_err(HookError::from)
        })
        .expect("register echo");
    }

    db.set("issue", &id, props([("title", "go")]))
        .expect("outer set should succeed");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        entries(&errors),
        vec!["hook nesting exceeded the limit of 1"]
    );
    assert_eq!(db.get("issue", &id, "title").expect("title"), Value::from("t0"));
}

#[test]
fn registering_on_an_unknown_class_fails() {
    let (mut db, _) = seeded_db();
    let err = db
        .audit("ticket", Event::Set, "x", |_, _, _, _| Ok(()))
        .expect_err("ticket is not a class");
    assert!(matches!(err, DbError::UnknownClass(class) if class == "ticket"));
}

#[test]
fn hooks_registered_mid_dispatch_apply_from_the_next_call() {
    let (mut db, _) = seeded_db();
    let log = new_log();
    {
        let log = Arc::clone(&log);
        db.audit("issue", Event::Create, "installer", move |db, _, _, _| {
            if db.hooks().auditors("issue", Event::Create).len() == 1 {
                let log = Arc::clone(&log);
                db.audit("issue", Event::Create, "late", move |_, _, _, _| {
                    push(&log, "late");
                    Ok(())
                })?;
            }
            Ok(())
        })
        .expect("register installer");
    }

    db.create("issue", props([("title", "a")])).expect("first create");
    assert!(entries(&log).is_empty());
    db.create("issue", props([("title", "b")])).expect("second create");
    assert_eq!(entries(&log), vec!["late"]);
}

#[test]
fn retire_and_restore_flip_visibility_and_fire_their_own_chains() {
    let (mut db, _) = seeded_db();
    let id = db
        .create("issue", props([("title", "x")]))
        .expect("create should succeed");
    let seen: Arc<Mutex<Vec<OldValues>>> = Arc::new(Mutex::new(Vec::new()));
    for event in [Event::Retire, Event::Restore] {
        let seen = Arc::clone(&seen);
        db.react("issue", event, "watch", move |_, _, _, old| {
            seen.lock().expect("lock").push(old.clone());
            Ok(())
        })
        .expect("register reactor");
    }

    db.retire("issue", &id).expect("retire should succeed");
    assert!(db.list("issue").expect("list").is_empty());
    assert!(db.is_retired("issue", &id).expect("retired flag"));
    assert!(matches!(
        db.set("issue", &id, props([("title", "y")])),
        Err(DbError::Retired { .. })
    ));

    db.restore("issue", &id).expect("restore should succeed");
    assert_eq!(db.list("issue").expect("list"), vec![id.clone()]);
    assert!(matches!(
        db.restore("issue", &id),
        Err(DbError::NotRetired { .. })
    ));

    assert_eq!(
        *seen.lock().expect("lock"),
        vec![OldValues::Retired, OldValues::Restored]
    );
}

#[test]
fn key_values_stay_unique_among_live_nodes() {
    let (mut db, _) = seeded_db();
    assert!(matches!(
        db.create("status", props([("name", "unread")])),
        Err(DbError::DuplicateKey { nodeid, .. }) if nodeid == "1"
    ));

    db.retire("status", "1").expect("retire should succeed");
    let replacement = db
        .create("status", props([("name", "unread")]))
        .expect("retired keys are free again");
    assert_eq!(db.lookup("status", "unread").expect("lookup"), replacement);
    assert!(matches!(
        db.restore("status", "1"),
        Err(DbError::DuplicateKey { .. })
    ));

    // Setting a node's key to its own value is not a clash.
    db.set("status", &replacement, props([("name", "unread")]))
        .expect("same key on the same node");
}

#[test]
fn links_resolve_by_key_and_multilinks_dedupe() {
    let (mut db, _) = seeded_db();
    let id = db
        .create(
            "issue",
            props([
                ("title", Value::from("x")),
                ("status", Value::from("chatting")),
                ("nosy", Value::from(vec!["alice", "2", "bob", "3"])),
                ("assignedto", Value::Integer(3)),
            ]),
        )
        .expect("create should succeed");
    assert_eq!(db.get("issue", &id, "status").expect("status"), Value::from("2"));
    assert_eq!(
        db.get("issue", &id, "nosy").expect("nosy"),
        Value::from(vec!["2", "3"])
    );
    assert_eq!(
        db.get("issue", &id, "assignedto").expect("assignedto"),
        Value::from("3")
    );

    assert!(matches!(
        db.set("issue", &id, props([("status", "nonexistent")])),
        Err(DbError::InvalidLink { target, .. }) if target == "status"
    ));
    assert!(matches!(
        db.set("issue", &id, props([("nosy", vec!["99"])])),
        Err(DbError::InvalidLink { .. })
    ));
}

#[test]
fn schema_violations_are_reported() {
    let (mut db, _) = seeded_db();
    assert!(matches!(
        db.create("issue", props([("creator", "2")])),
        Err(DbError::ReservedProperty { prop }) if prop == "creator"
    ));
    assert!(matches!(
        db.create("issue", props([("colour", "red")])),
        Err(DbError::UnknownProperty { .. })
    ));
    assert!(matches!(
        db.create("issue", props([("title", true)])),
        Err(DbError::TypeMismatch { .. })
    ));
    assert!(matches!(
        db.set("issue", "42", PropMap::new()),
        Err(DbError::NodeNotFound { .. })
    ));
    assert!(matches!(
        db.create("ticket", PropMap::new()),
        Err(DbError::UnknownClass(_))
    ));
}

#[test]
fn history_combines_committed_and_pending_entries() {
    let (mut db, _) = seeded_db();
    db.set_tx_source(Some(TxSource::Cli)).expect("stamp source");
    let id = db
        .create("issue", props([("title", "one")]))
        .expect("create should succeed");
    assert_eq!(db.commit().expect("commit"), 1);

    db.set("issue", &id, props([("title", "two")]))
        .expect("set should succeed");
    let history = db.history("issue", &id).expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].action, JournalAction::Create);
    assert_eq!(history[1].action, JournalAction::Set);
    assert_eq!(history[1].changes, props([("title", "one")]));
    assert!(history.iter().all(|e| e.source.as_deref() == Some("cli")));
    assert_ne!(history[0].tx_id, history[1].tx_id);
    assert_eq!(db.tx_source(), Some(TxSource::Cli));
}

#[test]
fn forked_handles_keep_their_own_source_under_interleaving() {
    let (mut db, _) = seeded_db();
    db.audit("issue", Event::Create, "stamp", |db, _, _, newvalues| {
        let source = db.tx_source().map_or("internal", TxSource::as_str);
        newvalues.set("tx_Source", source);
        Ok(())
    })
    .expect("register stamp");

    let mut web = db.fork();
    let mut mail = db.fork();
    web.set_tx_source(Some(TxSource::Web)).expect("web source");
    mail.set_tx_source(Some(TxSource::Email)).expect("email source");

    let (web_ids, mail_ids) = std::thread::scope(|scope| {
        let web = scope.spawn(move || {
            (0..25)
                .map(|i| {
                    web.create("issue", props([("title", format!("web {i}"))]))
                        .expect("web create")
                })
                .collect::<Vec<_>>()
        });
        let mail = scope.spawn(move || {
            (0..25)
                .map(|i| {
                    mail.create("issue", props([("title", format!("mail {i}"))]))
                        .expect("mail create")
                })
                .collect::<Vec<_>>()
        });
        (
            web.join().expect("web thread"),
            mail.join().expect("mail thread"),
        )
    });

    for id in &web_ids {
        assert_eq!(db.get("issue", id, "tx_Source").expect("source"), Value::from("web"));
    }
    for id in &mail_ids {
        assert_eq!(
            db.get("issue", id, "tx_Source").expect("source"),
            Value::from("email")
        );
    }
    assert_eq!(db.list("issue").expect("list").len(), 50);
}

#[test]
fn unchanged_outcome_maps_to_an_empty_commit() {
    let outcome = DispatchOutcome::Unchanged {
        class: "issue".to_string(),
        nodeid: "4".to_string(),
    };
    let commit = outcome.into_result().expect("unchanged is success");
    assert_eq!(commit.nodeid, "4");
    assert!(commit.changed.is_empty());
    assert!(tracker_schema().has_class("issue"));
}
