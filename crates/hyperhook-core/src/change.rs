//! Values passed to hooks: the proposed change and the pre-image.

use hyperhook_db::{PropMap, Value};

/// The property map auditors observe and may rewrite.
///
/// For create it starts as the caller's map; for set it holds only the
/// properties the caller is changing; for retire/restore it is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposedChange {
    values: PropMap,
}

impl ProposedChange {
    pub fn new(values: PropMap) -> Self {
        Self { values }
    }

    pub fn get(&self, prop: &str) -> Option<&Value> {
        self.values.get(prop)
    }

    pub fn contains(&self, prop: &str) -> bool {
        self.values.contains_key(prop)
    }

    pub fn set(&mut self, prop: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(prop.into(), value.into());
    }

    pub fn remove(&mut self, prop: &str) -> Option<Value> {
        self.values.remove(prop)
    }

    pub fn replace(&mut self, values: PropMap) {
        self.values = values;
    }

    pub fn values(&self) -> &PropMap {
        &self.values
    }

    pub fn into_values(self) -> PropMap {
        self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<PropMap> for ProposedChange {
    fn from(values: PropMap) -> Self {
        Self::new(values)
    }
}

/// What a reactor sees of the state before the change.
#[derive(Debug, Clone, PartialEq)]
pub enum OldValues {
    /// The node was just created.
    Created,
    /// Pre-change values of exactly the properties that changed.
    Changed(PropMap),
    Retired,
    Restored,
}

impl OldValues {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }

    pub fn changed(&self) -> Option<&PropMap> {
        match self {
            Self::Changed(map) => Some(map),
            _ => None,
        }
    }

    /// Previous value of `prop`, if it changed.
    pub fn get(&self, prop: &str) -> Option<&Value> {
        self.changed().and_then(|map| map.get(prop))
    }
}
