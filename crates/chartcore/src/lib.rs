//! Core types for the flowchart interpreter
//!
//! This crate provides the graph model consumed from the visual editor,
//! the dynamic value type used by the expression evaluator, the error
//! taxonomy, structural validation of charts before execution, and the
//! pseudocode rendering of a chart.

mod error;
mod graph;
mod pseudocode;
mod validate;
mod value;

pub use error::{EvalError, GraphError, RunError};
pub use graph::{BranchLabel, Edge, Flowchart, Node, NodeData, NodeId, NodeKind};
pub use pseudocode::{render_pseudocode, to_pseudocode, PseudoLine};
pub use validate::{validate, ValidationReport};
pub use value::Value;
