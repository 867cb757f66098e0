//! # hyperhook-expr
//!
//! The multilink filter expression language.
//!
//! A filter is transported as a postfix program of integers: positive
//! values are link ids ("this id is in the set"), and four negative values
//! are operators.
//!
//! ```text
//! -1  EMPTY   the set is empty        (arity 0)
//! -2  NOT                             (arity 1)
//! -3  AND                             (arity 2)
//! -4  OR                              (arity 2)
//! ```
//!
//! [`compile_expression`] is the strict compiler. [`Expression`] is the total
//! constructor used by queries and auditors: when the input is not a valid
//! program it falls back to matching a plain list of ids.

pub mod error;
pub mod expression;
pub mod node;
pub mod parse;

pub use error::ExpressionError;
pub use expression::{Expression, MatchMode, UNSET_ID};
pub use node::{Atom, ExprNode, OP_AND, OP_EMPTY, OP_NOT, OP_OR, compile_expression};
pub use parse::parse_generated;
