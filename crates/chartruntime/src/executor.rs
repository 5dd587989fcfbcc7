use crate::controller::StepGate;
use crate::{expr, Environment, FlowIo};
use chartcore::{BranchLabel, EvalError, Flowchart, Node, NodeKind, RunError, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed,
    Stopped,
    Failed,
}

/// Observable state of one run. Created fresh at `start()`, mutated only
/// by the executor and controller, and left as the run's final record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionState {
    pub current_node_id: Option<String>,
    pub is_running: bool,
    pub is_paused: bool,
    pub is_waiting_for_input: bool,
    pub output: Vec<String>,
    pub variables: BTreeMap<String, Value>,
    pub error: Option<String>,
    pub outcome: Option<RunOutcome>,
}

pub(crate) type SharedState = Arc<Mutex<ExecutionState>>;

pub(crate) fn lock_state(state: &SharedState) -> MutexGuard<'_, ExecutionState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One activation of a While or For node. The stack replaces the
/// recursion the editor used to drive loop bodies: a dead end inside a
/// body resumes at the innermost loop node, like the unwinding call
/// stack did.
#[derive(Debug)]
enum LoopFrame {
    While {
        node_id: String,
        iterations: u32,
    },
    For {
        node_id: String,
        current: f64,
        end: f64,
        step: f64,
        iterations: u32,
    },
}

impl LoopFrame {
    fn node_id(&self) -> &str {
        match self {
            LoopFrame::While { node_id, .. } | LoopFrame::For { node_id, .. } => node_id,
        }
    }
}

/// Where execution goes after visiting a node
enum Flow<'a> {
    Goto(&'a Node),
    DeadEnd,
    Finished,
    Stopped,
}

/// Walks the graph one node at a time, performing each node's effect
/// through the environment, the evaluator and the I/O bridge.
pub(crate) struct Executor<'a> {
    chart: &'a Flowchart,
    io: Arc<dyn FlowIo>,
    env: Environment,
    state: SharedState,
    frames: Vec<LoopFrame>,
    loop_limit: u32,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(
        chart: &'a Flowchart,
        io: Arc<dyn FlowIo>,
        state: SharedState,
        loop_limit: u32,
    ) -> Self {
        Self {
            chart,
            io,
            env: Environment::new(),
            state,
            frames: Vec::new(),
            loop_limit,
        }
    }

    /// Drive the chart from its Start node until it completes, stops or
    /// fails. Exactly one node is in flight at a time; the gate is
    /// awaited between visits for pacing, pause and cancellation.
    pub(crate) async fn run(&mut self, gate: &mut StepGate) -> Result<RunOutcome, RunError> {
        let mut cursor = self.chart.find_start()?;

        loop {
            self.set_current(Some(&cursor.id));
            self.io.set_highlight(Some(&cursor.id));
            if !gate.wait_step().await {
                return Ok(RunOutcome::Stopped);
            }

            match self.visit(cursor, gate).await? {
                Flow::Goto(next) => cursor = next,
                Flow::Finished => return Ok(RunOutcome::Completed),
                Flow::Stopped => return Ok(RunOutcome::Stopped),
                Flow::DeadEnd => match self.resume_loop() {
                    Some(loop_node) => cursor = loop_node,
                    None => {
                        self.io.log("Execution halted: no outgoing connection.");
                        tracing::debug!("run halted at a dead end");
                        return Ok(RunOutcome::Completed);
                    }
                },
            }
        }
    }

    async fn visit(&mut self, node: &'a Node, gate: &mut StepGate) -> Result<Flow<'a>, RunError> {
        tracing::trace!(node_id = %node.id, kind = %node.kind, "visiting node");
        match node.kind {
            NodeKind::Start => Ok(self.follow(node, None)),
            NodeKind::End => {
                self.io.log("Execution finished.");
                self.frames.clear();
                Ok(Flow::Finished)
            }
            NodeKind::Process => self.visit_process(node),
            NodeKind::Input => self.visit_input(node, gate).await,
            NodeKind::Output => self.visit_output(node),
            NodeKind::Decision => self.visit_decision(node),
            NodeKind::While => self.visit_while(node),
            NodeKind::For => self.visit_for(node),
        }
    }

    fn visit_process(&mut self, node: &'a Node) -> Result<Flow<'a>, RunError> {
        let expression = node.data.expression();
        let (name, rhs) =
            split_assignment(expression).ok_or_else(|| RunError::InvalidAssignment {
                expression: expression.to_string(),
            })?;
        let value = expr::evaluate(rhs, &self.env)?;
        self.io.log(&format!("{} = {}", name, value));
        self.bind(name, value);
        Ok(self.follow(node, None))
    }

    async fn visit_input(
        &mut self,
        node: &'a Node,
        gate: &mut StepGate,
    ) -> Result<Flow<'a>, RunError> {
        let variable = node.data.variable().to_string();
        let prompt = format!("Enter value for {}:", variable);
        self.set_waiting(true);
        tracing::debug!(node_id = %node.id, %variable, "waiting for input");

        // A stop during the suspension wins the race; a value resolved
        // after that is discarded, never applied to the environment.
        let io = Arc::clone(&self.io);
        let cancel = gate.token().clone();
        let raw = tokio::select! {
            _ = cancel.cancelled() => None,
            raw = io.request_input(&prompt) => Some(raw),
        };
        self.set_waiting(false);
        let Some(raw) = raw else {
            return Ok(Flow::Stopped);
        };

        let value = Value::from_input(&raw);
        self.io.log(&format!("{} = {}", variable, value));
        self.bind(&variable, value);
        Ok(self.follow(node, None))
    }

    fn visit_output(&mut self, node: &'a Node) -> Result<Flow<'a>, RunError> {
        let value = expr::evaluate(node.data.expression(), &self.env)?;
        let rendered = value.to_string();
        self.io.log(&format!("Output: {}", rendered));
        lock_state(&self.state).output.push(rendered);
        Ok(self.follow(node, None))
    }

    fn visit_decision(&mut self, node: &'a Node) -> Result<Flow<'a>, RunError> {
        let condition = node.data.condition();
        let result = expr::evaluate_condition(condition, &self.env)?;
        self.io
            .log(&format!("Condition \"{}\" is {}", condition, result));

        let branch = BranchLabel::from_bool(result);
        match self.chart.next_node(&node.id, Some(branch)) {
            Some(next) => Ok(Flow::Goto(next)),
            None => {
                // A missing branch halts gracefully, it is not a failure
                tracing::warn!(node_id = %node.id, branch = branch.as_str(), "decision branch not connected");
                Ok(Flow::DeadEnd)
            }
        }
    }

    fn visit_while(&mut self, node: &'a Node) -> Result<Flow<'a>, RunError> {
        if !self.reenter_loop(node)? {
            self.io.log("While loop entered.");
            self.frames.push(LoopFrame::While {
                node_id: node.id.clone(),
                iterations: 0,
            });
        }

        let condition = node.data.condition();
        let result = expr::evaluate_condition(condition, &self.env)?;
        self.io
            .log(&format!("Condition \"{}\" is {}", condition, result));

        if result {
            Ok(self.follow_branch(node, BranchLabel::True))
        } else {
            let iterations = match self.frames.pop() {
                Some(LoopFrame::While { iterations, .. }) => iterations,
                _ => 0,
            };
            self.io
                .log(&format!("While loop finished after {} iterations.", iterations));
            Ok(self.follow_branch(node, BranchLabel::False))
        }
    }

    fn visit_for(&mut self, node: &'a Node) -> Result<Flow<'a>, RunError> {
        if !self.reenter_loop(node)? {
            let start = self.eval_number(node.data.loop_start())?;
            let end = self.eval_number(node.data.loop_end())?;
            let step = self.eval_number(node.data.loop_step())?;
            self.io.log(&format!(
                "For loop entered: {} from {} to {} step {}",
                node.data.loop_variable(),
                Value::Number(start),
                Value::Number(end),
                Value::Number(step),
            ));
            self.frames.push(LoopFrame::For {
                node_id: node.id.clone(),
                current: start,
                end,
                step,
                iterations: 0,
            });
        }

        let (current, end) = match self.frames.last() {
            Some(LoopFrame::For { current, end, .. }) => (*current, *end),
            _ => return Ok(Flow::DeadEnd),
        };

        if current <= end {
            self.bind(node.data.loop_variable(), Value::Number(current));
            Ok(self.follow(node, None))
        } else {
            self.frames.pop();
            self.io.log("For loop finished.");
            // No exit edge is consulted: loop completion unwinds like a
            // dead end, resuming any enclosing loop.
            Ok(Flow::DeadEnd)
        }
    }

    /// Detect re-entry: the node owns a frame somewhere on the stack,
    /// meaning its body has wound its way back for another iteration.
    /// Loops opened after that frame never finished their bodies, so
    /// their frames are abandoned; searching the whole stack (not just
    /// the top) keeps the iteration cap armed even when two loops enter
    /// each other's bodies and alternate frames.
    fn reenter_loop(&mut self, node: &Node) -> Result<bool, RunError> {
        let Some(pos) = self
            .frames
            .iter()
            .rposition(|frame| frame.node_id() == node.id)
        else {
            return Ok(false);
        };
        self.frames.truncate(pos + 1);
        self.advance_frame(node)?;
        Ok(true)
    }

    /// Step the innermost frame forward and enforce the iteration cap.
    fn advance_frame(&mut self, node: &Node) -> Result<(), RunError> {
        let limit = self.loop_limit;
        let iterations = match self.frames.last_mut() {
            Some(LoopFrame::While { iterations, .. }) => {
                *iterations += 1;
                *iterations
            }
            Some(LoopFrame::For {
                current,
                step,
                iterations,
                ..
            }) => {
                *current += *step;
                *iterations += 1;
                *iterations
            }
            None => 0,
        };
        if iterations >= limit {
            return Err(RunError::LoopLimitExceeded {
                node_id: node.id.to_string(),
                limit,
            });
        }
        Ok(())
    }

    fn resume_loop(&self) -> Option<&'a Node> {
        let frame = self.frames.last()?;
        self.chart.node(frame.node_id())
    }

    fn follow(&self, node: &'a Node, label: Option<BranchLabel>) -> Flow<'a> {
        match self.chart.next_node(&node.id, label) {
            Some(next) => Flow::Goto(next),
            None => Flow::DeadEnd,
        }
    }

    fn follow_branch(&self, node: &'a Node, label: BranchLabel) -> Flow<'a> {
        self.follow(node, Some(label))
    }

    fn eval_number(&self, text: &str) -> Result<f64, RunError> {
        let value = expr::evaluate(text, &self.env)?;
        match value.as_number() {
            Some(n) => Ok(n),
            None => Err(RunError::Eval(EvalError::TypeMismatch {
                operation: "loop bound".to_string(),
                expected: "number",
                found: value,
            })),
        }
    }

    fn bind(&mut self, name: &str, value: Value) {
        self.env.set(name, value);
        lock_state(&self.state).variables = self.env.snapshot();
    }

    fn set_current(&self, node_id: Option<&str>) {
        lock_state(&self.state).current_node_id = node_id.map(|id| id.to_string());
    }

    fn set_waiting(&self, waiting: bool) {
        lock_state(&self.state).is_waiting_for_input = waiting;
    }
}

/// Split a Process expression into its `name = rhs` halves. The left
/// side must be a bare identifier and the right side non-empty.
fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let (lhs, rhs) = text.split_once('=')?;
    let name = lhs.trim();
    let rhs = rhs.trim();
    if name.is_empty() || rhs.is_empty() || rhs.starts_with('=') {
        return None;
    }
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, rhs))
}
