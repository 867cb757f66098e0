use crate::support::{CLASSIC_PRIORITIES, CLASSIC_STATUSES, classic_schema, cli_session, fail};
use hyperhook_core::{DetectorCatalog, Tracker, TrackerConfig, Value, props};
use hyperhook_db::Schema;
use hyperhook_detectors::standard_catalog;
use serde_json::json;

pub fn run(home: String, schema: Option<String>, enable: Vec<String>, json_output: bool) {
    let catalog = standard_catalog();
    if let Some(unknown) = enable.iter().find(|name| catalog.get(name).is_none()) {
        let available: Vec<&str> = catalog.names().collect();
        fail(format!(
            "unknown builtin detector {unknown:?} (available: {})",
            available.join(", ")
        ));
    }

    let (schema, classic) = match &schema {
        Some(path) => {
            let schema = Schema::load(path)
                .unwrap_or_else(|e| fail(format!("failed to load schema {path}: {e}")));
            (schema, false)
        }
        None => (classic_schema(), true),
    };
    let tracker = Tracker::init(&home, &schema, &TrackerConfig::default())
        .unwrap_or_else(|e| fail(e));
    let seeded = if classic { seed_classic(&tracker) } else { 0 };
    for name in &enable {
        tracker.enable_builtin(name).unwrap_or_else(|e| fail(e));
    }

    let schema_kind = if classic { "classic" } else { "custom" };
    let classes: Vec<&str> = schema.class_names().collect();
    tracing::info!(
        home = %tracker.home().display(),
        schema = schema_kind,
        classes = classes.len(),
        seeded,
        enabled = ?enable,
        "tracker initialized"
    );
    if json_output {
        let payload = json!({
            "action": "init",
            "home": tracker.home().display().to_string(),
            "schema": schema_kind,
            "classes": classes,
            "seeded": seeded,
            "enabled": enable,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).unwrap_or_else(|e| fail(e))
        );
        return;
    }

    println!("hyperhook init {home}");
    println!();
    println!("  schema: {schema_kind} ({} classes)", classes.len());
    println!("  seeded nodes: {seeded}");
    if enable.is_empty() {
        println!("  enabled detectors: (none)");
    } else {
        println!("  enabled detectors: {}", enable.join(", "));
    }
}

/// Statuses, priorities, the admin user (uid 1) and the `patch` keyword.
fn seed_classic(tracker: &Tracker) -> usize {
    let seeded = tracker.transact(&DetectorCatalog::new(), &cli_session(None), |db| {
        let mut created = 0;
        for (class, names) in [
            ("status", CLASSIC_STATUSES.as_slice()),
            ("priority", CLASSIC_PRIORITIES.as_slice()),
        ] {
            for (order, name) in names.iter().enumerate() {
                db.create(
                    class,
                    props([
                        ("name", Value::from(*name)),
                        ("order", Value::from((order + 1) as f64)),
                    ]),
                )?;
                created += 1;
            }
        }
        db.create("user", props([("username", "admin")]))?;
        db.create("keyword", props([("name", "patch")]))?;
        Ok(created + 2)
    });
    seeded.unwrap_or_else(|e| fail(format!("failed to seed {}: {e}", tracker.home().display())))
}
