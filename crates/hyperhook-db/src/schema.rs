//! Classes and property kinds.
//!
//! The schema file is TOML:
//!
//! ```toml
//! [classes.status]
//! key = "name"
//! properties = { name = "string", order = "number" }
//!
//! [classes.issue.properties]
//! title = "string"
//! status = { link = "status" }
//! nosy = { multilink = "user" }
//! ```

use crate::node::RESERVED_PROPS;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

/// Kind of a class property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    String,
    Number,
    Integer,
    Boolean,
    Date,
    Password,
    Link(String),
    Multilink(String),
}

impl PropKind {
    /// Target class of a link or multilink.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Link(target) | Self::Multilink(target) => Some(target),
            _ => None,
        }
    }

    pub fn is_multilink(&self) -> bool {
        matches!(self, Self::Multilink(_))
    }

    /// Value stored for a property that was never set.
    pub fn empty_value(&self) -> Value {
        match self {
            Self::Multilink(_) => Value::List(Vec::new()),
            _ => Value::Null,
        }
    }

    /// Change-detection equality. Multilinks compare as sets.
    pub fn same_value(&self, a: &Value, b: &Value) -> bool {
        match self {
            Self::Multilink(_) => {
                let left: BTreeSet<&str> = a
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .map(String::as_str)
                    .collect();
                let right: BTreeSet<&str> = b
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .map(String::as_str)
                    .collect();
                left == right
            }
            _ => a == b,
        }
    }

    /// Whether `value` has the right shape for this kind (links are checked
    /// for existence separately).
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::String | Self::Password | Self::Date, Value::String(_)) => true,
            (Self::Number, Value::Number(_) | Value::Integer(_)) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Link(_), Value::String(_) | Value::Integer(_)) => true,
            (Self::Multilink(_), Value::List(_) | Value::String(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Integer => f.write_str("integer"),
            Self::Boolean => f.write_str("boolean"),
            Self::Date => f.write_str("date"),
            Self::Password => f.write_str("password"),
            Self::Link(target) => write!(f, "link({target})"),
            Self::Multilink(target) => write!(f, "multilink({target})"),
        }
    }
}

/// One class: optional key property and the property kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropKind>,
}

impl ClassDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, prop: impl Into<String>) -> Self {
        self.key = Some(prop.into());
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, kind: PropKind) -> Self {
        self.properties.insert(name.into(), kind);
        self
    }

    pub fn prop(&self, name: &str) -> Option<&PropKind> {
        self.properties.get(name)
    }
}

/// The set of classes known to a database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub classes: BTreeMap<String, ClassDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, name: impl Into<String>, class: ClassDef) -> Self {
        self.classes.insert(name.into(), class);
        self
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn prop(&self, class: &str, prop: &str) -> Option<&PropKind> {
        self.class(class).and_then(|c| c.prop(prop))
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Parse and validate a TOML schema.
    pub fn from_toml_str(text: &str) -> Result<Self, SchemaError> {
        let schema: Self = toml::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load and validate a TOML schema file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SchemaError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, SchemaError> {
        toml::to_string_pretty(self).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    /// Check structural consistency: link targets exist, key properties are
    /// strings, implicit property names are not redeclared.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (class, def) in &self.classes {
            for (prop, kind) in &def.properties {
                if RESERVED_PROPS.contains(&prop.as_str()) {
                    return Err(SchemaError::ReservedProperty {
                        class: class.clone(),
                        prop: prop.clone(),
                    });
                }
                if let Some(target) = kind.target()
                    && !self.has_class(target)
                {
                    return Err(SchemaError::UnknownTarget {
                        class: class.clone(),
                        prop: prop.clone(),
                        target: target.to_string(),
                    });
                }
            }
            if let Some(key) = &def.key {
                match def.prop(key) {
                    Some(PropKind::String) => {}
                    _ => {
                        return Err(SchemaError::BadKey {
                            class: class.clone(),
                            key: key.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Errors raised while loading a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema I/O error: {0}")]
    Io(String),

    #[error("schema parse error: {0}")]
    Parse(String),

    #[error("{class}.{prop} links to unknown class {target:?}")]
    UnknownTarget {
        class: String,
        prop: String,
        target: String,
    },

    #[error("{class}.{prop} shadows an implicit property")]
    ReservedProperty { class: String, prop: String },

    #[error("key property {class}.{key} must be a declared string property")]
    BadKey { class: String, key: String },
}
