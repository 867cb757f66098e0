//! Nosy list maintenance and message fan-out.

use crate::link_ids;
use hyperhook_core::{
    Database, Detector, DetectorError, Event, HookError, OldValues, ProposedChange, props,
};
use std::fmt;
use std::sync::Arc;

/// Delivers a new issue message to nosy users.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        issue: &str,
        msgid: &str,
        recipients: &[String],
    ) -> Result<(), HookError>;
}

/// Logs each delivery instead of sending mail.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        issue: &str,
        msgid: &str,
        recipients: &[String],
    ) -> Result<(), HookError> {
        tracing::info!(
            issue = %issue,
            msg = %msgid,
            recipients = ?recipients,
            "message sent to nosy list"
        );
        Ok(())
    }
}

/// Keeps `issue.nosy` current and sends new messages to it.
///
/// The auditor adds a newly assigned user to the nosy list. The reactor
/// sends each new message through the [`Notifier`], then adds the
/// message authors and recipients to the nosy list with a cascaded set.
#[derive(Clone)]
pub struct NosyReaction {
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for NosyReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NosyReaction").finish_non_exhaustive()
    }
}

impl Default for NosyReaction {
    fn default() -> Self {
        Self::with_notifier(Arc::new(LogNotifier))
    }
}

impl NosyReaction {
    pub fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

impl Detector for NosyReaction {
    fn name(&self) -> &str {
        "nosyreaction"
    }

    fn register(&self, db: &mut Database) -> Result<(), DetectorError> {
        for event in [Event::Create, Event::Set] {
            db.audit("issue", event, "nosyreaction::updatenosy", updatenosy)?;
            let notifier = Arc::clone(&self.notifier);
            db.react(
                "issue",
                event,
                "nosyreaction::nosyreaction",
                move |db: &mut Database, class: &str, nodeid: &str, oldvalues: &OldValues| {
                    nosyreaction(notifier.as_ref(), db, class, nodeid, oldvalues)
                },
            )?;
        }
        Ok(())
    }
}

/// Messages on `nodeid` that this change added.
fn new_messages(
    db: &Database,
    class: &str,
    nodeid: &str,
    oldvalues: &OldValues,
) -> Result<Vec<String>, HookError> {
    let current = link_ids(&db.get(class, nodeid, "messages")?);
    Ok(match oldvalues {
        OldValues::Created => current,
        OldValues::Changed(old) => match old.get("messages") {
            Some(old) => {
                let old = link_ids(old);
                current.into_iter().filter(|id| !old.contains(id)).collect()
            }
            None => Vec::new(),
        },
        OldValues::Retired | OldValues::Restored => Vec::new(),
    })
}

fn nosyreaction(
    notifier: &dyn Notifier,
    db: &mut Database,
    class: &str,
    nodeid: &str,
    oldvalues: &OldValues,
) -> Result<(), HookError> {
    let messages = new_messages(db, class, nodeid, oldvalues)?;
    if messages.is_empty() {
        return Ok(());
    }

    let exclude = db.config().nosy.exclude_uid.clone();
    let nosy = link_ids(&db.get(class, nodeid, "nosy")?);
    let mut updated = nosy.clone();
    for msgid in &messages {
        let author = db.get("msg", msgid, "author")?;
        let already = link_ids(&db.get("msg", msgid, "recipients")?);
        let recipients: Vec<String> = nosy
            .iter()
            .filter(|uid| **uid != exclude && !already.contains(*uid))
            .filter(|uid| author.as_str() != Some(uid.as_str()))
            .cloned()
            .collect();
        if !recipients.is_empty() {
            notifier.notify(nodeid, msgid, &recipients)?;
        }

        let joining = author.as_str().map(str::to_string).into_iter().chain(already);
        for uid in joining {
            if uid != exclude && !updated.contains(&uid) {
                updated.push(uid);
            }
        }
    }

    if updated != nosy {
        tracing::debug!(issue = %nodeid, nosy = ?updated, "extending nosy list");
        db.set(class, nodeid, props([("nosy", updated)]))?;
    }
    Ok(())
}

/// Add a newly assigned user to the proposed nosy list.
fn updatenosy(
    db: &mut Database,
    class: &str,
    nodeid: Option<&str>,
    newvalues: &mut ProposedChange,
) -> Result<(), HookError> {
    let Some(assignee) = newvalues.get("assignedto").map(link_ids) else {
        return Ok(());
    };
    let mut nosy = match (newvalues.get("nosy"), nodeid) {
        (Some(proposed), _) => link_ids(proposed),
        (None, Some(nodeid)) => link_ids(&db.get(class, nodeid, "nosy")?),
        (None, None) => Vec::new(),
    };
    let before = nosy.len();
    for uid in assignee {
        if !nosy.contains(&uid) {
            nosy.push(uid);
        }
    }
    if nosy.len() != before {
        newvalues.set("nosy", nosy);
    }
    Ok(())
}
