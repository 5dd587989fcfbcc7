//! Textual expression evaluation
//!
//! Expressions authored in the editor are tokenized, parsed with a small
//! recursive-descent parser (C-like precedence), and evaluated against
//! the current environment. This replaces the dynamic `eval` the editor
//! used in the browser and closes its injection surface: statement
//! separators are rejected outright, and identifiers are resolved
//! through the environment instead of textual substitution.

mod eval;
mod lexer;
mod parser;

pub use eval::eval;
pub use lexer::{tokenize, Token};
pub use parser::{parse, BinaryOp, Expr, UnaryOp};

use crate::Environment;
use chartcore::{EvalError, Value};

/// Evaluate an expression to a value.
pub fn evaluate(text: &str, env: &Environment) -> Result<Value, EvalError> {
    if text.contains([';', '{', '}']) {
        return Err(EvalError::ForbiddenSyntax(text.to_string()));
    }
    let tokens = tokenize(text)?;
    let expr = parse(text, tokens)?;
    eval(&expr, env)
}

/// Evaluate an expression and coerce the result to a boolean.
pub fn evaluate_condition(text: &str, env: &Environment) -> Result<bool, EvalError> {
    Ok(evaluate(text, env)?.truthy())
}
