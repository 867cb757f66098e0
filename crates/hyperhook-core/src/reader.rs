//! Read-only view of schema and storage, shared with script host functions.

use crate::error::DbError;
use hyperhook_db::{ClassDef, Node, RESERVED_PROPS, Schema, Storage, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Reader {
    schema: Arc<Schema>,
    storage: Arc<dyn Storage>,
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("classes", &self.schema.classes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Reader {
    pub fn new(schema: Arc<Schema>, storage: Arc<dyn Storage>) -> Self {
        Self { schema, storage }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn shared_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn class(&self, class: &str) -> Result<&ClassDef, DbError> {
        self.schema
            .class(class)
            .ok_or_else(|| DbError::UnknownClass(class.to_string()))
    }

    /// Fetch a node, retired or not.
    pub fn node(&self, class: &str, nodeid: &str) -> Result<Node, DbError> {
        self.class(class)?;
        self.storage
            .node(class, nodeid)?
            .ok_or_else(|| DbError::node_not_found(class, nodeid))
    }

    /// Read one property. Implicit properties are always readable; schema
    /// properties never stored read as their empty value.
    pub fn get(&self, class: &str, nodeid: &str, prop: &str) -> Result<Value, DbError> {
        let node = self.node(class, nodeid)?;
        if RESERVED_PROPS.contains(&prop) {
            return Ok(node.get(prop).unwrap_or_default());
        }
        let kind = self
            .schema
            .prop(class, prop)
            .ok_or_else(|| DbError::UnknownProperty {
                class: class.to_string(),
                prop: prop.to_string(),
            })?;
        Ok(node.get(prop).unwrap_or_else(|| kind.empty_value()))
    }

    pub fn has_node(&self, class: &str, nodeid: &str) -> Result<bool, DbError> {
        self.class(class)?;
        Ok(self.storage.node(class, nodeid)?.is_some())
    }

    pub fn is_retired(&self, class: &str, nodeid: &str) -> Result<bool, DbError> {
        Ok(self.node(class, nodeid)?.retired)
    }

    /// Live nodes of `class`, in numeric id order.
    pub fn live_nodes(&self, class: &str) -> Result<Vec<Node>, DbError> {
        self.class(class)?;
        let mut nodes = Vec::new();
        for id in self.storage.ids(class)? {
            if let Some(node) = self.storage.node(class, &id)?
                && !node.retired
            {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Live ids of `class`, in numeric order.
    pub fn list(&self, class: &str) -> Result<Vec<String>, DbError> {
        Ok(self
            .live_nodes(class)?
            .into_iter()
            .map(|node| node.id)
            .collect())
    }

    /// Id of the live node whose key property equals `key`.
    pub fn lookup(&self, class: &str, key: &str) -> Result<String, DbError> {
        self.find_key(class, key)?
            .ok_or_else(|| DbError::KeyNotFound {
                class: class.to_string(),
                key: key.to_string(),
            })
    }

    /// Like `lookup`, but a missing key is `Ok(None)`.
    pub fn find_key(&self, class: &str, key: &str) -> Result<Option<String>, DbError> {
        let keyprop = self
            .class(class)?
            .key
            .clone()
            .ok_or_else(|| DbError::NoKey {
                class: class.to_string(),
            })?;
        Ok(self
            .live_nodes(class)?
            .into_iter()
            .find(|node| node.props.get(&keyprop).and_then(Value::as_str) == Some(key))
            .map(|node| node.id))
    }
}
