//! Error types for filter-expression compilation and parsing.

/// Errors raised while compiling an opcode program or parsing rendered text.
///
/// `Expression::new` never surfaces these; it falls back to plain id
/// matching instead. They are returned by the strict entry points
/// (`compile_expression`, `parse_generated`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("empty filter expression")]
    Empty,

    #[error("value {value:?} at position {position} is not an integer opcode")]
    NotInteger { value: String, position: usize },

    #[error("no operator opcodes in {opcodes:?}; treating it as a plain id list")]
    NoOperators { opcodes: Vec<i64> },

    #[error("unknown operator {opcode} at position {position}")]
    UnknownOperator { opcode: i64, position: usize },

    #[error(
        "the operator {opcode} ({name}) at position {position} has too few arguments in {opcodes:?}"
    )]
    TooFewArguments {
        opcode: i64,
        name: &'static str,
        position: usize,
        opcodes: Vec<i64>,
    },

    #[error(
        "there are too many arguments for the existing operators in {opcodes:?}: {depth} values remain on the stack"
    )]
    TooManyArguments { opcodes: Vec<i64>, depth: usize },

    #[error("expression text is malformed at byte {offset}: {reason}")]
    Syntax { offset: usize, reason: String },
}
