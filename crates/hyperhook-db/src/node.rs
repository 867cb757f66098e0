//! Stored nodes and their implicit properties.

use crate::value::{PropMap, Value};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Property names maintained by storage. They cannot be declared in a
/// schema or passed in a create/set.
pub const RESERVED_PROPS: [&str; 5] = ["id", "creation", "activity", "creator", "actor"];

/// One entity instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub class: String,
    pub id: String,
    #[serde(default)]
    pub props: PropMap,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retired: bool,
    pub creation: DateTime<Utc>,
    pub activity: DateTime<Utc>,
    pub creator: String,
    pub actor: String,
}

impl Node {
    pub fn new(
        class: impl Into<String>,
        id: impl Into<String>,
        props: PropMap,
        uid: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let uid = uid.into();
        Self {
            class: class.into(),
            id: id.into(),
            props,
            retired: false,
            creation: at,
            activity: at,
            creator: uid.clone(),
            actor: uid,
        }
    }

    /// Read a property, including the implicit ones. Unknown names read as
    /// `None`.
    pub fn get(&self, prop: &str) -> Option<Value> {
        let stamp =
            |at: &DateTime<Utc>| Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true));
        match prop {
            "id" => Some(Value::String(self.id.clone())),
            "creation" => Some(stamp(&self.creation)),
            "activity" => Some(stamp(&self.activity)),
            "creator" => Some(Value::String(self.creator.clone())),
            "actor" => Some(Value::String(self.actor.clone())),
            other => self.props.get(other).cloned(),
        }
    }

    /// Apply changes and stamp `activity`/`actor`.
    pub fn apply(&mut self, changes: &PropMap, actor: &str, at: DateTime<Utc>) {
        for (name, value) in changes {
            self.props.insert(name.clone(), value.clone());
        }
        self.touch(actor, at);
    }

    pub fn touch(&mut self, actor: &str, at: DateTime<Utc>) {
        self.activity = at;
        self.actor = actor.to_string();
    }

    /// Designator in `classid` form, e.g. `issue12`.
    pub fn designator(&self) -> String {
        format!("{}{}", self.class, self.id)
    }
}

/// Order decimal ids numerically (no leading zeros are ever allocated).
pub fn id_order(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
