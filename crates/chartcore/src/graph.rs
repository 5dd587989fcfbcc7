use crate::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type NodeId = String;

/// Block kinds supported by the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    End,
    Input,
    Output,
    Process,
    Decision,
    While,
    For,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Input => "input",
            NodeKind::Output => "output",
            NodeKind::Process => "process",
            NodeKind::Decision => "decision",
            NodeKind::While => "while",
            NodeKind::For => "for",
        };
        write!(f, "{}", name)
    }
}

/// Kind-specific node fields as authored in the editor. All fields are
/// optional on the wire; accessors supply the editor's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_step: Option<String>,
}

impl NodeData {
    pub fn expression(&self) -> &str {
        self.expression.as_deref().unwrap_or("")
    }

    pub fn condition(&self) -> &str {
        self.condition.as_deref().unwrap_or("")
    }

    pub fn variable(&self) -> &str {
        self.variable.as_deref().unwrap_or("input")
    }

    pub fn loop_variable(&self) -> &str {
        self.loop_variable.as_deref().unwrap_or("i")
    }

    pub fn loop_start(&self) -> &str {
        self.loop_start.as_deref().unwrap_or("0")
    }

    pub fn loop_end(&self) -> &str {
        self.loop_end.as_deref().unwrap_or("10")
    }

    pub fn loop_step(&self) -> &str {
        self.loop_step.as_deref().unwrap_or("1")
    }
}

/// One block of the flowchart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: NodeData::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = Some(label.into());
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.data.variable = Some(variable.into());
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.data.expression = Some(expression.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.data.condition = Some(condition.into());
        self
    }

    pub fn with_loop(
        mut self,
        variable: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        self.data.loop_variable = Some(variable.into());
        self.data.loop_start = Some(start.into());
        self.data.loop_end = Some(end.into());
        self.data.loop_step = Some(step.into());
        self
    }
}

/// Branch discriminator on edges leaving Decision and While nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchLabel {
    True,
    False,
}

impl BranchLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchLabel::True => "true",
            BranchLabel::False => "false",
        }
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            BranchLabel::True
        } else {
            BranchLabel::False
        }
    }
}

/// Directed connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(
        rename = "sourceHandle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
}

/// The node/edge collection consumed from the editor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flowchart {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Flowchart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        serde_json::from_str(json).map_err(|e| GraphError::Json(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        serde_json::to_string_pretty(self).map_err(|e| GraphError::Json(e.to_string()))
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect two nodes with an unlabeled edge
    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        self.push_edge(source.into(), target.into(), None);
    }

    /// Connect two nodes through a true/false branch handle
    pub fn connect_branch(
        &mut self,
        source: impl Into<NodeId>,
        label: BranchLabel,
        target: impl Into<NodeId>,
    ) {
        self.push_edge(source.into(), target.into(), Some(label.as_str().into()));
    }

    fn push_edge(&mut self, source: NodeId, target: NodeId, source_handle: Option<String>) {
        let id = format!("e{}", self.edges.len() + 1);
        self.edges.push(Edge {
            id,
            source,
            target,
            source_handle,
        });
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The unique entry point of a runnable chart. Duplicate Start nodes
    /// are caught by validation; the first one wins here.
    pub fn find_start(&self) -> Result<&Node, GraphError> {
        self.nodes
            .iter()
            .find(|n| n.kind == NodeKind::Start)
            .ok_or(GraphError::MissingStart)
    }

    /// Resolve the first outgoing edge of `id`, optionally requiring a
    /// branch label. `None` means a dead end, which halts execution
    /// without error.
    pub fn next_node(&self, id: &str, label: Option<BranchLabel>) -> Option<&Node> {
        let edge = self.edges.iter().find(|e| {
            e.source == id
                && match label {
                    Some(l) => e.source_handle.as_deref() == Some(l.as_str()),
                    None => true,
                }
        })?;
        self.node(&edge.target)
    }
}
