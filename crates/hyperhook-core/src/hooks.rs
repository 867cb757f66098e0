//! Hook registry: ordered auditor and reactor chains per (class, event).

use crate::change::{OldValues, ProposedChange};
use crate::database::Database;
use crate::error::HookError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A class operation hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Create,
    Set,
    Retire,
    Restore,
}

impl Event {
    pub const ALL: [Event; 4] = [Self::Create, Self::Set, Self::Retire, Self::Restore];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Set => "set",
            Self::Retire => "retire",
            Self::Restore => "restore",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("unknown event {s:?} (expected create, set, retire or restore)"))
    }
}

/// Pre-commit hook. `nodeid` is `None` for create.
pub type AuditFn =
    dyn Fn(&mut Database, &str, Option<&str>, &mut ProposedChange) -> Result<(), HookError>
        + Send
        + Sync;

/// Post-commit hook.
pub type ReactFn =
    dyn Fn(&mut Database, &str, &str, &OldValues) -> Result<(), HookError> + Send + Sync;

#[derive(Clone)]
pub struct Auditor {
    pub name: String,
    pub func: Arc<AuditFn>,
}

#[derive(Clone)]
pub struct Reactor {
    pub name: String,
    pub func: Arc<ReactFn>,
}

impl fmt::Debug for Auditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auditor").field("name", &self.name).finish()
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    Auditor,
    Reactor,
}

/// One row of the registration listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub class: String,
    pub event: Event,
    pub kind: HookKind,
    pub name: String,
}

/// Append-only hook lists.
///
/// Lookups return snapshots, so a hook that registers more hooks while it
/// runs does not change the chain currently being walked.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    auditors: BTreeMap<(String, Event), Vec<Auditor>>,
    reactors: BTreeMap<(String, Event), Vec<Reactor>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_auditor(&mut self, class: &str, event: Event, auditor: Auditor) {
        self.auditors
            .entry((class.to_string(), event))
            .or_default()
            .push(auditor);
    }

    pub fn add_reactor(&mut self, class: &str, event: Event, reactor: Reactor) {
        self.reactors
            .entry((class.to_string(), event))
            .or_default()
            .push(reactor);
    }

    pub fn auditors(&self, class: &str, event: Event) -> Vec<Auditor> {
        self.auditors
            .get(&(class.to_string(), event))
            .cloned()
            .unwrap_or_default()
    }

    pub fn reactors(&self, class: &str, event: Event) -> Vec<Reactor> {
        self.reactors
            .get(&(class.to_string(), event))
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.auditors.values().map(Vec::len).sum::<usize>()
            + self.reactors.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registration, auditors before reactors per (class, event), in
    /// registration order within a chain.
    pub fn registrations(&self) -> Vec<Registration> {
        let mut keys: Vec<&(String, Event)> =
            self.auditors.keys().chain(self.reactors.keys()).collect();
        keys.sort();
        keys.dedup();

        let mut rows = Vec::new();
        for key in keys {
            let (class, event) = key;
            for auditor in self.auditors.get(key).into_iter().flatten() {
                rows.push(Registration {
                    class: class.clone(),
                    event: *event,
                    kind: HookKind::Auditor,
                    name: auditor.name.clone(),
                });
            }
            for reactor in self.reactors.get(key).into_iter().flatten() {
                rows.push(Registration {
                    class: class.clone(),
                    event: *event,
                    kind: HookKind::Reactor,
                    name: reactor.name.clone(),
                });
            }
        }
        rows
    }
}
