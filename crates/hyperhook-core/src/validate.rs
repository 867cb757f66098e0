//! Schema validation and normalization of a proposed property map.

use crate::error::DbError;
use crate::reader::Reader;
use hyperhook_db::{PropKind, PropMap, RESERVED_PROPS, Value};

/// Check `values` against the schema of `class` and normalize them:
/// links given by key resolve to ids, multilinks are deduplicated in
/// first-seen order, integers stored in number properties widen.
///
/// `nodeid` is the node being changed, excluded from the key uniqueness
/// check.
pub(crate) fn normalize(
    reader: &Reader,
    class: &str,
    values: PropMap,
    nodeid: Option<&str>,
) -> Result<PropMap, DbError> {
    let def = reader.class(class)?;
    let mut out = PropMap::new();
    for (prop, value) in values {
        if RESERVED_PROPS.contains(&prop.as_str()) {
            return Err(DbError::ReservedProperty { prop });
        }
        let kind = def.prop(&prop).ok_or_else(|| DbError::UnknownProperty {
            class: class.to_string(),
            prop: prop.clone(),
        })?;
        if !kind.accepts(&value) {
            return Err(DbError::TypeMismatch {
                class: class.to_string(),
                prop,
                expected: kind.to_string(),
                value: format!("{value:?}"),
            });
        }
        let value = match kind {
            PropKind::Link(target) => link_value(reader, class, &prop, target, value)?,
            PropKind::Multilink(target) => multilink_value(reader, class, &prop, target, value)?,
            PropKind::Number => match value {
                Value::Integer(n) => Value::Number(n as f64),
                other => other,
            },
            _ => value,
        };
        out.insert(prop, value);
    }

    if let Some(keyprop) = &def.key
        && let Some(key) = out.get(keyprop).and_then(Value::as_str)
        && let Some(existing) = reader.find_key(class, key)?
        && Some(existing.as_str()) != nodeid
    {
        return Err(DbError::DuplicateKey {
            class: class.to_string(),
            key: key.to_string(),
            nodeid: existing,
        });
    }
    Ok(out)
}

fn link_value(
    reader: &Reader,
    class: &str,
    prop: &str,
    target: &str,
    value: Value,
) -> Result<Value, DbError> {
    let raw = match value {
        Value::Null => return Ok(Value::Null),
        Value::Integer(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => return Ok(Value::Null),
        Value::String(s) => s,
        other => format!("{other}"),
    };
    resolve_id(reader, target, &raw)?
        .map(Value::String)
        .ok_or_else(|| invalid_link(class, prop, target, &raw))
}

fn multilink_value(
    reader: &Reader,
    class: &str,
    prop: &str,
    target: &str,
    value: Value,
) -> Result<Value, DbError> {
    let items = match value {
        Value::String(s) => vec![s],
        other => other.to_list(),
    };
    let mut ids: Vec<String> = Vec::with_capacity(items.len());
    for raw in items {
        let id = resolve_id(reader, target, &raw)?
            .ok_or_else(|| invalid_link(class, prop, target, &raw))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(Value::List(ids))
}

/// A numeric id of an existing node (retired nodes count), otherwise the
/// live node whose key equals `raw`.
pub(crate) fn resolve_id(
    reader: &Reader,
    target: &str,
    raw: &str,
) -> Result<Option<String>, DbError> {
    let raw = raw.trim();
    if raw.parse::<u64>().is_ok() && reader.has_node(target, raw)? {
        return Ok(Some(raw.to_string()));
    }
    if reader.class(target)?.key.is_none() {
        return Ok(None);
    }
    reader.find_key(target, raw)
}

fn invalid_link(class: &str, prop: &str, target: &str, raw: &str) -> DbError {
    DbError::InvalidLink {
        class: class.to_string(),
        prop: prop.to_string(),
        target: target.to_string(),
        value: raw.to_string(),
    }
}
