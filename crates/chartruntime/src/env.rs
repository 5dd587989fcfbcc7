use chartcore::{EvalError, Value};
use std::collections::{BTreeMap, HashMap};

/// The run's mutable symbol table. There is no declaration step: the
/// first assignment creates a binding, and reads of unbound names fail.
#[derive(Debug, Default)]
pub struct Environment {
    vars: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Result<&Value, EvalError> {
        self.vars
            .get(name)
            .ok_or_else(|| EvalError::UnboundVariable(name.to_string()))
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Ordered copy of the bindings, for state snapshots and display
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
