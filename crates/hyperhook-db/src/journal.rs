//! History journal entries recorded per committed change.

use crate::value::PropMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalAction {
    Create,
    Set,
    Retire,
    Restore,
}

impl JournalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Set => "set",
            Self::Retire => "retire",
            Self::Restore => "restore",
        }
    }
}

impl fmt::Display for JournalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One history line for a node.
///
/// `changes` holds the committed values for create, and the *previous*
/// values of the changed properties for set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub tx_id: String,
    pub class: String,
    pub nodeid: String,
    pub action: JournalAction,
    #[serde(default, skip_serializing_if = "PropMap::is_empty")]
    pub changes: PropMap,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub at: DateTime<Utc>,
}
