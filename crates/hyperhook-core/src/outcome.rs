//! Operations the dispatcher mediates and what comes back.

use crate::change::OldValues;
use crate::error::{DbError, Reject};
use crate::hooks::Event;
use hyperhook_db::PropMap;

/// A class operation submitted to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create {
        class: String,
        props: PropMap,
    },
    Set {
        class: String,
        nodeid: String,
        props: PropMap,
    },
    Retire {
        class: String,
        nodeid: String,
    },
    Restore {
        class: String,
        nodeid: String,
    },
}

impl Operation {
    pub fn create(class: impl Into<String>, props: PropMap) -> Self {
        Self::Create {
            class: class.into(),
            props,
        }
    }

    pub fn set(class: impl Into<String>, nodeid: impl Into<String>, props: PropMap) -> Self {
        Self::Set {
            class: class.into(),
            nodeid: nodeid.into(),
            props,
        }
    }

    pub fn retire(class: impl Into<String>, nodeid: impl Into<String>) -> Self {
        Self::Retire {
            class: class.into(),
            nodeid: nodeid.into(),
        }
    }

    pub fn restore(class: impl Into<String>, nodeid: impl Into<String>) -> Self {
        Self::Restore {
            class: class.into(),
            nodeid: nodeid.into(),
        }
    }

    pub fn event(&self) -> Event {
        match self {
            Self::Create { .. } => Event::Create,
            Self::Set { .. } => Event::Set,
            Self::Retire { .. } => Event::Retire,
            Self::Restore { .. } => Event::Restore,
        }
    }

    pub fn class(&self) -> &str {
        match self {
            Self::Create { class, .. }
            | Self::Set { class, .. }
            | Self::Retire { class, .. }
            | Self::Restore { class, .. } => class,
        }
    }

    /// `None` for create.
    pub fn nodeid(&self) -> Option<&str> {
        match self {
            Self::Create { .. } => None,
            Self::Set { nodeid, .. }
            | Self::Retire { nodeid, .. }
            | Self::Restore { nodeid, .. } => Some(nodeid),
        }
    }

    /// Move the caller's property map out (empty for retire/restore).
    pub(crate) fn take_props(&mut self) -> PropMap {
        match self {
            Self::Create { props, .. } | Self::Set { props, .. } => std::mem::take(props),
            Self::Retire { .. } | Self::Restore { .. } => PropMap::new(),
        }
    }
}

/// A committed change.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub class: String,
    pub nodeid: String,
    pub event: Event,
    /// Committed values of the properties that changed (all given values on
    /// create).
    pub changed: PropMap,
    pub old: OldValues,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Committed(Commit),
    /// A set whose values all equal the stored ones. Nothing was written and
    /// no reactor ran.
    Unchanged { class: String, nodeid: String },
    Rejected(Reject),
    InternalError(DbError),
}

impl DispatchOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn into_result(self) -> Result<Commit, DbError> {
        match self {
            Self::Committed(commit) => Ok(commit),
            Self::Unchanged { class, nodeid } => Ok(Commit {
                class,
                nodeid,
                event: Event::Set,
                changed: PropMap::new(),
                old: OldValues::Changed(PropMap::new()),
            }),
            Self::Rejected(reject) => Err(DbError::Rejected(reject)),
            Self::InternalError(err) => Err(err),
        }
    }
}
