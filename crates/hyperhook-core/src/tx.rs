//! Transaction context: one source tag and one id per transaction.

use chrono::{DateTime, Utc};
use hyperhook_db::{JournalEntry, Node};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The front-end that initiated a transaction.
///
/// `None` at the `Option<TxSource>` level is the internal/programmatic
/// source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxSource {
    Cli,
    Web,
    Rest,
    Xmlrpc,
    Email,
    EmailSigOpenpgp,
}

impl TxSource {
    pub const ALL: [TxSource; 6] = [
        Self::Cli,
        Self::Web,
        Self::Rest,
        Self::Xmlrpc,
        Self::Email,
        Self::EmailSigOpenpgp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Web => "web",
            Self::Rest => "rest",
            Self::Xmlrpc => "xmlrpc",
            Self::Email => "email",
            Self::EmailSigOpenpgp => "email-sig-openpgp",
        }
    }
}

impl fmt::Display for TxSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxSource {
    type Err = TxSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| TxSourceError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unknown transaction source {0:?} (expected one of cli, web, rest, xmlrpc, email, email-sig-openpgp)"
)]
pub struct TxSourceError(pub String);

/// How to take back one storage write.
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    /// A created node: remove it.
    Inserted { class: String, nodeid: String },
    /// A changed node: put the pre-image back.
    Replaced(Node),
}

/// Position in a transaction to rewind to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Savepoint {
    journal: usize,
    undo: usize,
}

/// State of the transaction a database handle is currently in.
///
/// Next to the pending journal it keeps an undo log of every storage write
/// made since the transaction began; `commit` discards it.
#[derive(Debug, Clone)]
pub struct TxContext {
    id: Uuid,
    source: Option<TxSource>,
    started: DateTime<Utc>,
    journal: Vec<JournalEntry>,
    undo: Vec<Undo>,
}

impl TxContext {
    pub fn new(source: Option<TxSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            started: Utc::now(),
            journal: Vec::new(),
            undo: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> Option<TxSource> {
        self.source
    }

    pub(crate) fn set_source(&mut self, source: Option<TxSource>) {
        self.source = source;
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Journal entries recorded but not yet handed to storage.
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    pub(crate) fn record(&mut self, entry: JournalEntry) {
        self.journal.push(entry);
    }

    pub(crate) fn take_journal(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.journal)
    }

    /// Number of storage writes that `rewind` would take back.
    pub fn uncommitted_writes(&self) -> usize {
        self.undo.len()
    }

    pub(crate) fn push_undo(&mut self, undo: Undo) {
        self.undo.push(undo);
    }

    pub(crate) fn savepoint(&self) -> Savepoint {
        Savepoint {
            journal: self.journal.len(),
            undo: self.undo.len(),
        }
    }

    /// Drop journal entries recorded after `savepoint` and hand back the
    /// undo steps after it, newest first.
    pub(crate) fn rewind(&mut self, savepoint: Savepoint) -> Vec<Undo> {
        self.journal.truncate(savepoint.journal);
        let mut steps = self.undo.split_off(savepoint.undo.min(self.undo.len()));
        steps.reverse();
        steps
    }
}

impl Default for TxContext {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for source in TxSource::ALL {
            let parsed: TxSource = source.as_str().parse().expect("wire name should parse");
            assert_eq!(parsed, source);
        }
        assert_eq!(
            serde_json::to_string(&TxSource::EmailSigOpenpgp).expect("serialize"),
            "\"email-sig-openpgp\""
        );
    }

    #[test]
    fn unknown_source_is_an_error() {
        let err = "smtp".parse::<TxSource>().expect_err("smtp is not a source");
        assert_eq!(err, TxSourceError("smtp".to_string()));
        assert!("CLI".parse::<TxSource>().is_err());
    }

    #[test]
    fn rewind_returns_later_steps_newest_first() {
        let mut tx = TxContext::default();
        tx.push_undo(Undo::Inserted {
            class: "issue".to_string(),
            nodeid: "1".to_string(),
        });
        let mark = tx.savepoint();
        for nodeid in ["2", "3"] {
            tx.push_undo(Undo::Inserted {
                class: "issue".to_string(),
                nodeid: nodeid.to_string(),
            });
        }

        let order: Vec<String> = tx
            .rewind(mark)
            .into_iter()
            .map(|step| match step {
                Undo::Inserted { nodeid, .. } => nodeid,
                Undo::Replaced(node) => node.id,
            })
            .collect();
        assert_eq!(order, vec!["3", "2"]);
        assert_eq!(tx.uncommitted_writes(), 1);
        assert_eq!(tx.rewind(Savepoint::default()).len(), 1);
        assert_eq!(tx.uncommitted_writes(), 0);
    }

    #[test]
    fn fresh_contexts_get_distinct_ids() {
        let a = TxContext::new(Some(TxSource::Web));
        let b = TxContext::new(Some(TxSource::Web));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.source(), Some(TxSource::Web));
        assert!(a.journal().is_empty());
    }
}
