//! Predicate trees compiled from postfix opcode programs.

use crate::error::ExpressionError;
use std::collections::BTreeSet;
use std::fmt;

/// Opcode for "the set is empty".
pub const OP_EMPTY: i64 = -1;
/// Opcode for logical negation (one operand).
pub const OP_NOT: i64 = -2;
/// Opcode for conjunction (two operands).
pub const OP_AND: i64 = -3;
/// Opcode for disjunction (two operands).
pub const OP_OR: i64 = -4;

/// Leaf of a predicate tree, handed to the caller's atom renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Atom {
    /// The id is a member of the candidate set.
    Equals(i64),
    /// The candidate set is empty.
    Empty,
}

/// A compiled filter predicate over a set of link ids.
///
/// Binary nodes keep their operands in pop order: `x` is the operand that
/// was on top of the stack (pushed last), `y` the one below it. Rendering
/// emits `x` first, so `[1, 2, -3]` renders as `(2)AND(1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprNode {
    Equals(i64),
    Empty,
    Not(Box<ExprNode>),
    And(Box<ExprNode>, Box<ExprNode>),
    Or(Box<ExprNode>, Box<ExprNode>),
}

impl ExprNode {
    /// Evaluate against a candidate set of link ids.
    pub fn evaluate(&self, ids: &BTreeSet<i64>) -> bool {
        match self {
            Self::Equals(id) => ids.contains(id),
            Self::Empty => ids.is_empty(),
            Self::Not(x) => !x.evaluate(ids),
            Self::And(x, y) => x.evaluate(ids) && y.evaluate(ids),
            Self::Or(x, y) => x.evaluate(ids) || y.evaluate(ids),
        }
    }

    /// Render as a parenthesized boolean expression.
    ///
    /// Operators are fixed (`NOT(X)`, `(X)AND(Y)`, `(X)OR(Y)`); atoms are
    /// rendered by `atom`, which lets a storage backend emit its own clause
    /// per id.
    pub fn generate<F>(&self, mut atom: F) -> String
    where
        F: FnMut(Atom) -> String,
    {
        self.render(&mut atom)
    }

    fn render(&self, atom: &mut dyn FnMut(Atom) -> String) -> String {
        match self {
            Self::Equals(id) => atom(Atom::Equals(*id)),
            Self::Empty => atom(Atom::Empty),
            Self::Not(x) => format!("NOT({})", x.render(atom)),
            Self::And(x, y) => format!("({})AND({})", x.render(atom), y.render(atom)),
            Self::Or(x, y) => format!("({})OR({})", x.render(atom), y.render(atom)),
        }
    }

    /// Ids referenced by `Equals` atoms, in render order.
    pub fn atom_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, out: &mut Vec<i64>) {
        match self {
            Self::Equals(id) => out.push(*id),
            Self::Empty => {}
            Self::Not(x) => x.collect_ids(out),
            Self::And(x, y) | Self::Or(x, y) => {
                x.collect_ids(out);
                y.collect_ids(out);
            }
        }
    }

    /// Serialize back to the postfix wire form.
    ///
    /// `compile_expression(&node.to_opcodes())` yields `node` again.
    pub fn to_opcodes(&self) -> Vec<i64> {
        let mut out = Vec::new();
        self.emit(&mut out);
        out
    }

    fn emit(&self, out: &mut Vec<i64>) {
        match self {
            Self::Equals(id) => out.push(*id),
            Self::Empty => out.push(OP_EMPTY),
            Self::Not(x) => {
                x.emit(out);
                out.push(OP_NOT);
            }
            // `y` sits below `x` on the stack, so it is emitted first.
            Self::And(x, y) => {
                y.emit(out);
                x.emit(out);
                out.push(OP_AND);
            }
            Self::Or(x, y) => {
                y.emit(out);
                x.emit(out);
                out.push(OP_OR);
            }
        }
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.generate(|atom| match atom {
            Atom::Equals(id) => id.to_string(),
            Atom::Empty => "EMPTY".to_string(),
        });
        f.write_str(&text)
    }
}

fn operator_name(opcode: i64) -> &'static str {
    match opcode {
        OP_NOT => "not",
        OP_AND => "and",
        OP_OR => "or",
        _ => "empty",
    }
}

/// Compile a postfix opcode program into a predicate tree.
///
/// Positive (and zero) opcodes push `Equals(id)`; `-1..=-4` are the
/// operators. Anything below `-4` is rejected.
pub fn compile_expression(opcodes: &[i64]) -> Result<ExprNode, ExpressionError> {
    if opcodes.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut stack: Vec<ExprNode> = Vec::with_capacity(opcodes.len());
    for (index, &opcode) in opcodes.iter().enumerate() {
        let too_few = || ExpressionError::TooFewArguments {
            opcode,
            name: operator_name(opcode),
            position: index + 1,
            opcodes: opcodes.to_vec(),
        };

        let node = match opcode {
            OP_EMPTY => ExprNode::Empty,
            OP_NOT => ExprNode::Not(Box::new(stack.pop().ok_or_else(too_few)?)),
            OP_AND | OP_OR => {
                let x = stack.pop().ok_or_else(too_few)?;
                let y = stack.pop().ok_or_else(too_few)?;
                if opcode == OP_AND {
                    ExprNode::And(Box::new(x), Box::new(y))
                } else {
                    ExprNode::Or(Box::new(x), Box::new(y))
                }
            }
            op if op < OP_OR => {
                return Err(ExpressionError::UnknownOperator {
                    opcode: op,
                    position: index + 1,
                });
            }
            id => ExprNode::Equals(id),
        };
        stack.push(node);
    }

    match stack.len() {
        1 => stack.pop().ok_or(ExpressionError::Empty),
        depth => Err(ExpressionError::TooManyArguments {
            opcodes: opcodes.to_vec(),
            depth,
        }),
    }
}
