use crate::support::{cli_session, fail, open_tracker_or_exit};
use hyperhook_core::HookKind;
use hyperhook_db::Storage;
use hyperhook_detectors::standard_catalog;
use serde_json::json;
use std::sync::Arc;

pub fn run(home: String, uid: Option<String>, enable: Vec<String>, json_output: bool) {
    let tracker = open_tracker_or_exit(&home);
    let catalog = standard_catalog();
    for name in &enable {
        if catalog.get(name).is_none() {
            fail(format!("unknown builtin detector {name:?}"));
        }
        let path = tracker.enable_builtin(name).unwrap_or_else(|e| fail(e));
        tracing::info!(detector = %name, path = %path.display(), "enabled builtin detector");
        if !json_output {
            println!("enabled {name} ({})", path.display());
        }
    }

    let storage: Arc<dyn Storage> = Arc::new(tracker.load_storage().unwrap_or_else(|e| fail(e)));
    let (db, report) = tracker
        .open_database(storage, &catalog, &cli_session(uid))
        .unwrap_or_else(|e| fail(e));
    let builtins: Vec<&str> = catalog.names().collect();
    let hooks = db.hooks().registrations();

    if json_output {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|(file, error)| json!({ "file": file, "error": error }))
            .collect();
        let payload = json!({
            "builtins": builtins,
            "loaded": report.loaded,
            "failed": failed,
            "hooks": hooks,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).unwrap_or_else(|e| fail(e))
        );
        return;
    }

    println!("detectors in {}", tracker.detectors_dir().display());
    println!();
    println!("  builtins: {}", builtins.join(", "));
    println!("  loaded: {}", report.loaded.len());
    for file in &report.loaded {
        println!("    - {file}");
    }
    if !report.failed.is_empty() {
        println!("  failed: {}", report.failed.len());
        for (file, error) in &report.failed {
            println!("    - {file}: {error}");
        }
    }
    println!("  hooks: {}", hooks.len());
    for hook in &hooks {
        let kind = match hook.kind {
            HookKind::Auditor => "audit",
            HookKind::Reactor => "react",
        };
        println!("    - {}.{} {kind} {}", hook.class, hook.event, hook.name);
    }
}
