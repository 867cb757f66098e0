mod support;

use hyperhook_core::{
    CONFIG_FILE, DB_DIR, DETECTORS_DIR, Database, Detector, DetectorCatalog, DetectorError, Event,
    Reject, SCHEMA_FILE, Session, Tracker, TrackerConfig, TrackerError, TxSource, Value, props,
};
use hyperhook_db::{JOURNAL_FILE, JournalAction, NODES_FILE};
use std::fs;
use support::{TempDirGuard, tracker_schema};

struct NoShouting;

impl Detector for NoShouting {
    fn name(&self) -> &str {
        "no_shouting"
    }

    fn register(&self, db: &mut Database) -> Result<(), DetectorError> {
        db.audit("issue", Event::Create, "no_shouting", |_, _, _, newvalues| {
            let title = newvalues
                .get("title")
                .map(ToString::to_string)
                .unwrap_or_default();
            if !title.is_empty() && title == title.to_uppercase() {
                return Err(Reject::new("please do not shout").into());
            }
            Ok(())
        })?;
        Ok(())
    }
}

fn catalog() -> DetectorCatalog {
    DetectorCatalog::new().with(NoShouting)
}

fn cli_session() -> Session {
    Session {
        uid: None,
        source: Some(TxSource::Cli),
    }
}

fn init_tracker(dir: &TempDirGuard) -> Tracker {
    let mut config = TrackerConfig::default();
    config.tracker.name = "demo".to_string();
    let tracker = Tracker::init(dir.path().join("home"), &tracker_schema(), &config)
        .expect("init should succeed");
    tracker
        .transact(&catalog(), &cli_session(), |db| {
            for name in ["unread", "chatting"] {
                db.create("status", props([("name", name)]))?;
            }
            db.create("user", props([("username", "admin")]))?;
            Ok(())
        })
        .expect("seed transaction should succeed");
    tracker
}

#[test]
fn init_writes_the_layout_and_open_reads_it_back() {
    let dir = TempDirGuard::new("tracker-init");
    let tracker = init_tracker(&dir);
    let home = tracker.home().to_path_buf();

    for name in [CONFIG_FILE, SCHEMA_FILE] {
        assert!(home.join(name).is_file(), "{name} should exist");
    }
    assert!(home.join(DETECTORS_DIR).is_dir());
    assert!(home.join(DB_DIR).join(NODES_FILE).is_file());
    assert!(home.join(DB_DIR).join(JOURNAL_FILE).is_file());

    let reopened = Tracker::open(&home).expect("open should succeed");
    assert_eq!(reopened.config().tracker.name, "demo");
    assert_eq!(reopened.schema(), tracker.schema());

    let err = Tracker::init(&home, &tracker_schema(), &TrackerConfig::default())
        .expect_err("home is already initialized");
    assert!(matches!(err, TrackerError::AlreadyInitialized(_)));
}

#[test]
fn open_without_a_schema_fails() {
    let dir = TempDirGuard::new("tracker-missing");
    let err = Tracker::open(dir.path()).expect_err("there is no schema");
    assert!(matches!(err, TrackerError::Schema(_)));
}

#[test]
fn committed_transactions_persist_with_their_source() {
    let dir = TempDirGuard::new("tracker-persist");
    let tracker = init_tracker(&dir);

    let id = tracker
        .transact(&catalog(), &cli_session(), |db| {
            db.create(
                "issue",
                props([("title", Value::from("crash")), ("status", Value::from("unread"))]),
            )
        })
        .expect("create should commit");
    assert_eq!(id, "1");

    let reopened = Tracker::open(tracker.home()).expect("open should succeed");
    let (status, history) = reopened
        .inspect(|db| Ok((db.get("issue", &id, "status")?, db.history("issue", &id)?)))
        .expect("inspect should succeed");
    assert_eq!(status, Value::from("1"));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, JournalAction::Create);
    assert_eq!(history[0].source.as_deref(), Some("cli"));
    assert_eq!(history[0].actor, "1");
}

#[test]
fn a_rejected_transaction_leaves_the_files_untouched() {
    let dir = TempDirGuard::new("tracker-reject");
    let tracker = init_tracker(&dir);
    tracker.enable_builtin("no_shouting").expect("manifest should be written");

    let nodes = tracker.db_dir().join(NODES_FILE);
    let before = fs::read_to_string(&nodes).expect("read nodes");

    let err = tracker
        .transact(&catalog(), &cli_session(), |db| {
            db.create("issue", props([("title", "quiet")]))?;
            db.create("issue", props([("title", "LOUD")]))
        })
        .expect_err("the second create is rejected");
    match err {
        TrackerError::Db(db_err) => {
            let reject = db_err.as_reject().expect("error should be a reject");
            assert_eq!(reject.to_string(), "please do not shout");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(fs::read_to_string(&nodes).expect("read nodes"), before);
    let issues = tracker
        .inspect(|db| db.list("issue"))
        .expect("inspect should succeed");
    assert!(issues.is_empty());
}

#[test]
fn session_uid_overrides_the_admin_default() {
    let dir = TempDirGuard::new("tracker-uid");
    let tracker = init_tracker(&dir);
    let session = Session {
        uid: Some("7".to_string()),
        source: Some(TxSource::Web),
    };
    let actor = tracker
        .transact(&catalog(), &session, |db| {
            assert_eq!(db.tx_source(), Some(TxSource::Web));
            let id = db.create("user", props([("username", "carol")]))?;
            db.get("user", &id, "creator")
        })
        .expect("create should commit");
    assert_eq!(actor, Value::from("7"));
}

#[test]
fn a_held_db_lock_refuses_the_transaction() {
    let dir = TempDirGuard::new("tracker-lock");
    let tracker = init_tracker(&dir);
    fs::write(tracker.db_dir().join(".lock"), "pid=1\n").expect("write stale lock");

    let err = tracker
        .transact(&catalog(), &cli_session(), |db| db.list("status"))
        .expect_err("lock is held");
    assert!(matches!(err, TrackerError::LockBusy { .. }));
}
