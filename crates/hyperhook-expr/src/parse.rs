//! Parser for the rendered form produced by `ExprNode::generate`.
//!
//! Grammar (atoms may not contain parentheses):
//!
//! ```text
//! expr := "NOT(" expr ")"
//!       | "(" expr ")" ("AND" | "OR") "(" expr ")"
//!       | atom
//! ```

use crate::error::ExpressionError;
use crate::node::{Atom, ExprNode};
use std::str::FromStr;

/// Parse rendered expression text back into a tree.
///
/// `atom` maps the text of one atom back to the atom it was rendered from;
/// returning `None` is a syntax error.
pub fn parse_generated<F>(text: &str, mut atom: F) -> Result<ExprNode, ExpressionError>
where
    F: FnMut(&str) -> Option<Atom>,
{
    let mut parser = Parser {
        text,
        offset: 0,
        atom: &mut atom,
    };
    let node = parser.expr()?;
    if parser.offset != text.len() {
        return Err(parser.error("trailing input"));
    }
    Ok(node)
}

struct Parser<'a, 'f> {
    text: &'a str,
    offset: usize,
    atom: &'f mut dyn FnMut(&str) -> Option<Atom>,
}

impl Parser<'_, '_> {
    fn rest(&self) -> &str {
        &self.text[self.offset..]
    }

    fn error(&self, reason: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.offset += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), ExpressionError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{token}`")))
        }
    }

    fn expr(&mut self) -> Result<ExprNode, ExpressionError> {
        if self.eat("NOT(") {
            let inner = self.expr()?;
            self.expect(")")?;
            return Ok(ExprNode::Not(Box::new(inner)));
        }

        if self.eat("(") {
            let x = self.expr()?;
            self.expect(")")?;
            let is_and = if self.eat("AND(") {
                true
            } else if self.eat("OR(") {
                false
            } else {
                return Err(self.error("expected `AND(` or `OR(`"));
            };
            let y = self.expr()?;
            self.expect(")")?;
            let (x, y) = (Box::new(x), Box::new(y));
            return Ok(if is_and {
                ExprNode::And(x, y)
            } else {
                ExprNode::Or(x, y)
            });
        }

        let text = self.text;
        let end = text[self.offset..]
            .find(['(', ')'])
            .map_or(text.len(), |idx| self.offset + idx);
        let raw = &text[self.offset..end];
        if raw.is_empty() {
            return Err(self.error("expected an atom"));
        }
        let parsed = (self.atom)(raw).ok_or_else(|| self.error(format!("unknown atom {raw:?}")))?;
        self.offset = end;
        Ok(match parsed {
            Atom::Equals(id) => ExprNode::Equals(id),
            Atom::Empty => ExprNode::Empty,
        })
    }
}

/// Parses the `Display` form: ids as decimal numbers, `EMPTY` for the
/// empty-set atom.
impl FromStr for ExprNode {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_generated(s, |raw| match raw {
            "EMPTY" => Some(Atom::Empty),
            other => other.parse().ok().map(Atom::Equals),
        })
    }
}
