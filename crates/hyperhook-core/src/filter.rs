//! Filter queries over link and multilink properties.

use crate::database::Database;
use crate::error::DbError;
use crate::validate::resolve_id;
use hyperhook_db::{PropKind, Value};
use hyperhook_expr::{Atom, Expression, MatchMode, UNSET_ID};

impl Database {
    /// Live ids of `class` matching every `(prop, values)` filter.
    ///
    /// Link and multilink filters go through [`Expression`]: an opcode
    /// program when the values form one, otherwise a plain id list where
    /// `"-1"` means unset/empty. Key values (`"chatting"`) resolve to ids.
    /// Other properties match when their display form equals one of the
    /// values.
    pub fn filter(
        &self,
        class: &str,
        filters: &[(String, Vec<String>)],
    ) -> Result<Vec<String>, DbError> {
        let def = self.reader.class(class)?;
        let mut compiled = Vec::with_capacity(filters.len());
        for (prop, values) in filters {
            let kind = def.prop(prop).ok_or_else(|| DbError::UnknownProperty {
                class: class.to_string(),
                prop: prop.clone(),
            })?;
            let matcher = match kind {
                PropKind::Link(target) | PropKind::Multilink(target) => {
                    let mode = match kind {
                        PropKind::Link(_) => MatchMode::Link,
                        _ => MatchMode::Multilink,
                    };
                    let values = self.resolve_filter_values(target, values)?;
                    let expression = Expression::new(values.as_slice(), mode);
                    if !expression.is_compiled() {
                        tracing::debug!(
                            class = %class,
                            prop = %prop,
                            values = ?values,
                            "filter values are a plain id list"
                        );
                    }
                    Matcher::Expression(expression)
                }
                _ => Matcher::Equals(values.clone()),
            };
            compiled.push((prop.as_str(), matcher));
        }

        Ok(self
            .reader
            .live_nodes(class)?
            .into_iter()
            .filter(|node| {
                compiled.iter().all(|(prop, matcher)| {
                    matcher.matches(node.props.get(*prop).unwrap_or(&Value::Null))
                })
            })
            .map(|node| node.id)
            .collect())
    }

    /// Render a backend clause for a compiled link/multilink filter.
    ///
    /// Returns `None` when the values do not form an opcode program; the
    /// backend then falls back to its plain id-list query.
    pub fn filter_clause<F>(
        &self,
        class: &str,
        prop: &str,
        values: &[String],
        atom: F,
    ) -> Result<Option<String>, DbError>
    where
        F: FnMut(Atom) -> String,
    {
        let mode = match self.reader.class(class)?.prop(prop) {
            Some(PropKind::Link(_)) => MatchMode::Link,
            Some(PropKind::Multilink(_)) => MatchMode::Multilink,
            _ => {
                return Err(DbError::TypeMismatch {
                    class: class.to_string(),
                    prop: prop.to_string(),
                    expected: "link or multilink".to_string(),
                    value: format!("{values:?}"),
                });
            }
        };
        Ok(Expression::new(values, mode)
            .compiled()
            .map(|node| node.generate(atom)))
    }

    fn resolve_filter_values(
        &self,
        target: &str,
        values: &[String],
    ) -> Result<Vec<String>, DbError> {
        let mut out = Vec::with_capacity(values.len());
        for value in values {
            if value.trim().parse::<i64>().is_ok() || value == UNSET_ID {
                out.push(value.clone());
                continue;
            }
            // Unknown keys stay as given and never match.
            let resolved = resolve_id(&self.reader, target, value)?;
            out.push(resolved.unwrap_or_else(|| value.clone()));
        }
        Ok(out)
    }
}

enum Matcher {
    Expression(Expression),
    Equals(Vec<String>),
}

impl Matcher {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Expression(expression) => match expression.mode() {
                MatchMode::Link => expression.matches_link(value.as_str()),
                MatchMode::Multilink => {
                    expression.matches_multilink(value.as_list().unwrap_or_default())
                }
            },
            Self::Equals(values) => {
                let shown = value.to_string();
                values.iter().any(|v| *v == shown)
            }
        }
    }
}
