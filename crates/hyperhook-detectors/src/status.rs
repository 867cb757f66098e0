//! Issue status workflow.

use crate::link_ids;
use hyperhook_core::{Database, Detector, DetectorError, Event, HookError, ProposedChange, Value};
use std::collections::BTreeSet;

/// States a new message moves to `chatting`. Missing states are skipped.
const CHATTY_FROM: [&str; 3] = ["unread", "resolved", "done-cbb"];
const CHATTING: &str = "chatting";
const UNREAD: &str = "unread";

/// `chatty` on `issue.set`, `presetunread` on `issue.create`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusAuditor;

impl Detector for StatusAuditor {
    fn name(&self) -> &str {
        "statusauditor"
    }

    fn register(&self, db: &mut Database) -> Result<(), DetectorError> {
        db.audit("issue", Event::Set, "statusauditor::chatty", chatty)?;
        db.audit("issue", Event::Create, "statusauditor::presetunread", presetunread)?;
        Ok(())
    }
}

/// Move an issue to `chatting` when a message arrives and nobody chose a
/// status explicitly.
fn chatty(
    db: &mut Database,
    class: &str,
    nodeid: Option<&str>,
    newvalues: &mut ProposedChange,
) -> Result<(), HookError> {
    let Some(nodeid) = nodeid else {
        return Ok(());
    };
    let Some(messages) = newvalues.get("messages") else {
        return Ok(());
    };
    let proposed: BTreeSet<String> = link_ids(messages).into_iter().collect();
    let stored: BTreeSet<String> = link_ids(&db.get(class, nodeid, "messages")?)
        .into_iter()
        .collect();
    if proposed == stored || newvalues.contains("status") {
        return Ok(());
    }

    let reader = db.reader();
    let Some(chatting) = reader.find_key("status", CHATTING)? else {
        tracing::debug!(issue = %nodeid, "no chatting state; status left alone");
        return Ok(());
    };
    let current = db.get(class, nodeid, "status")?;
    let current = current.as_str();

    let mut from = Vec::with_capacity(CHATTY_FROM.len());
    for state in CHATTY_FROM {
        if let Some(id) = reader.find_key("status", state)? {
            from.push(id);
        }
    }
    if let Some(id) = current
        && !from.iter().any(|state| state == id)
    {
        return Ok(());
    }

    if db.config().statusauditor.chatting_requires_two_users
        && current.is_some()
        && current == reader.find_key("status", UNREAD)?.as_deref()
        && db.get(class, nodeid, "creator")? == Value::from(db.getuid())
    {
        tracing::debug!(issue = %nodeid, "creator is still alone on the issue");
        return Ok(());
    }

    newvalues.set("status", chatting);
    Ok(())
}

/// Give new issues the configured initial state.
fn presetunread(
    db: &mut Database,
    _class: &str,
    _nodeid: Option<&str>,
    newvalues: &mut ProposedChange,
) -> Result<(), HookError> {
    if newvalues.get("status").is_some_and(Value::is_truthy) {
        return Ok(());
    }
    let initial = &db.config().statusauditor.initial_state;
    match db.reader().find_key("status", initial)? {
        Some(id) => newvalues.set("status", id),
        None => tracing::debug!(state = %initial, "initial state does not exist"),
    }
    Ok(())
}
