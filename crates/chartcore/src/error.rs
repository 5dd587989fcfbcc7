use crate::Value;
use thiserror::Error;

/// Errors in the structure of a chart, detected before any step runs.
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("no Start node found")]
    MissingStart,

    #[error("failed to parse flowchart JSON: {0}")]
    Json(String),
}

/// Errors raised while evaluating an expression or condition.
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    #[error("unbound variable '{0}'")]
    UnboundVariable(String),

    #[error("failed to parse expression '{text}': {reason}")]
    Parse { text: String, reason: String },

    #[error("expression '{0}' contains a statement separator")]
    ForbiddenSyntax(String),

    #[error("type mismatch in '{operation}': expected {expected}, found {found}")]
    TypeMismatch {
        operation: String,
        expected: &'static str,
        found: Value,
    },
}

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    Graph(#[from] GraphError),

    #[error("{0}")]
    Eval(#[from] EvalError),

    #[error("loop limit exceeded at node '{node_id}' ({limit} iterations)")]
    LoopLimitExceeded { node_id: String, limit: u32 },

    #[error("invalid assignment '{expression}': expected 'variable = expression'")]
    InvalidAssignment { expression: String },

    #[error("a run is already in progress")]
    AlreadyRunning,
}
