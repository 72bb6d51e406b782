use thiserror::Error;

use crate::parser::Rule;

#[derive(Debug, Clone, Error)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(Box<pest::error::Error<Rule>>),
    #[error("unknown function '{0}()'")]
    UnknownFunction(String),
    #[error("{name}() expects {expected} argument(s), got {found}")]
    Arity { name: String, expected: &'static str, found: usize },
    #[error("type error: {0}")]
    Type(String),
    #[error("variable '{0}' is not defined")]
    UndefinedVariable(String),
    #[error("division by zero")]
    DivisionByZero,
}
