//! Flowchart execution runtime
//!
//! This crate walks the graph supplied by the editor: it maintains the
//! variable environment, evaluates textual expressions with its own
//! recursive-descent evaluator, and drives branching and looping control
//! flow with pausable, cancellable, asynchronously-suspending execution.

mod controller;
mod env;
mod executor;
pub mod expr;
mod io;

pub use controller::{Controller, RunConfig, Speed};
pub use env::Environment;
pub use executor::{ExecutionState, RunOutcome};
pub use io::FlowIo;
