//! Total construction of link/multilink predicates from query values.

use crate::error::ExpressionError;
use crate::node::{ExprNode, OP_EMPTY, compile_expression};
use std::collections::BTreeSet;

/// The id value that stands for "unset" / "empty" in plain id lists.
pub const UNSET_ID: &str = "-1";

/// Which kind of property the expression is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Single-valued link: the candidate is one id or unset.
    Link,
    /// Set-valued link: the candidate is a set of ids.
    Multilink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Compiled(ExprNode),
    /// Link fallback: candidate is one of `ids`, or unset when `unset` is true.
    OneOf { ids: BTreeSet<String>, unset: bool },
    /// Multilink fallback: candidate intersects `ids`, or is empty when
    /// `or_empty` is true.
    Intersects { ids: BTreeSet<String>, or_empty: bool },
}

/// A filter predicate that always exists.
///
/// Values that form a valid opcode program (every value an integer, at
/// least one operator below `-1`) compile to an [`ExprNode`]. Anything else
/// is treated as a plain list of ids, with `"-1"` meaning "unset" (link) or
/// "empty" (multilink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    mode: MatchMode,
    predicate: Predicate,
}

impl Expression {
    pub fn new<S: AsRef<str>>(values: &[S], mode: MatchMode) -> Self {
        let predicate = match try_compile(values) {
            Ok(node) => Predicate::Compiled(node),
            Err(_) => fallback(values, mode),
        };
        Self { mode, predicate }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// The compiled tree, when the values formed a valid opcode program.
    pub fn compiled(&self) -> Option<&ExprNode> {
        match &self.predicate {
            Predicate::Compiled(node) => Some(node),
            _ => None,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled().is_some()
    }

    /// Match a single-valued link.
    pub fn matches_link(&self, candidate: Option<&str>) -> bool {
        match &self.predicate {
            Predicate::Compiled(node) => {
                let ids: BTreeSet<i64> = candidate
                    .and_then(|id| id.trim().parse().ok())
                    .into_iter()
                    .collect();
                node.evaluate(&ids)
            }
            Predicate::OneOf { ids, unset } => match candidate {
                None => *unset,
                Some(id) => ids.contains(id),
            },
            Predicate::Intersects { ids, or_empty } => match candidate {
                None => *or_empty,
                Some(id) => ids.contains(id),
            },
        }
    }

    /// Match a set-valued link. Order and duplicates are irrelevant.
    pub fn matches_multilink<S: AsRef<str>>(&self, candidate: &[S]) -> bool {
        match &self.predicate {
            Predicate::Compiled(node) => {
                let ids: BTreeSet<i64> = candidate
                    .iter()
                    .filter_map(|id| id.as_ref().trim().parse().ok())
                    .collect();
                node.evaluate(&ids)
            }
            Predicate::Intersects { ids, or_empty } => {
                (*or_empty && candidate.is_empty())
                    || candidate.iter().any(|id| ids.contains(id.as_ref()))
            }
            Predicate::OneOf { ids, unset } => {
                (*unset && candidate.is_empty())
                    || candidate.iter().any(|id| ids.contains(id.as_ref()))
            }
        }
    }
}

fn try_compile<S: AsRef<str>>(values: &[S]) -> Result<ExprNode, ExpressionError> {
    let opcodes = values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            value
                .as_ref()
                .trim()
                .parse::<i64>()
                .map_err(|_| ExpressionError::NotInteger {
                    value: value.as_ref().to_string(),
                    position: index + 1,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if opcodes.is_empty() {
        return Err(ExpressionError::Empty);
    }
    if !opcodes.iter().any(|&op| op < OP_EMPTY) {
        return Err(ExpressionError::NoOperators { opcodes });
    }
    compile_expression(&opcodes)
}

fn fallback<S: AsRef<str>>(values: &[S], mode: MatchMode) -> Predicate {
    let has_unset = values.iter().any(|v| v.as_ref() == UNSET_ID);
    match mode {
        MatchMode::Link => Predicate::OneOf {
            ids: values
                .iter()
                .map(|v| v.as_ref())
                .filter(|v| *v != UNSET_ID)
                .map(str::to_string)
                .collect(),
            unset: has_unset,
        },
        MatchMode::Multilink if has_unset => Predicate::Intersects {
            // Negative ids never name a node; non-numeric keys pass through.
            ids: values
                .iter()
                .map(|v| v.as_ref())
                .filter(|v| v.parse::<i64>().map_or(true, |n| n > 0))
                .map(str::to_string)
                .collect(),
            or_empty: true,
        },
        MatchMode::Multilink => Predicate::Intersects {
            ids: values.iter().map(|v| v.as_ref().to_string()).collect(),
            or_empty: false,
        },
    }
}
