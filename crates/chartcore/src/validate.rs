use crate::{Flowchart, NodeKind};
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;

/// Outcome of the structural checks run before execution
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if !self.errors.is_empty() {
            writeln!(f, "Errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}", err)?;
            }
            first = false;
        }
        if !self.warnings.is_empty() {
            if !first {
                writeln!(f)?;
            }
            writeln!(f, "Warnings:")?;
            for warn in &self.warnings {
                writeln!(f, "  - {}", warn)?;
            }
            first = false;
        }
        if first {
            writeln!(f, "Flowchart is valid and ready to run")?;
        }
        Ok(())
    }
}

fn node_name(chart: &Flowchart, id: &str) -> String {
    match chart.node(id) {
        Some(node) => node
            .data
            .label
            .clone()
            .unwrap_or_else(|| format!("{} ({})", node.kind, node.id)),
        None => id.to_string(),
    }
}

/// Check chart structure before a run: exactly one Start, at least one
/// reachable End, branch edges on Decision nodes, and connectivity of
/// every block. Errors make the chart unrunnable; warnings do not.
pub fn validate(chart: &Flowchart) -> ValidationReport {
    let mut report = ValidationReport::default();

    let start_ids: Vec<&str> = chart
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Start)
        .map(|n| n.id.as_str())
        .collect();
    let end_ids: Vec<&str> = chart
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::End)
        .map(|n| n.id.as_str())
        .collect();

    match start_ids.len() {
        0 => report
            .errors
            .push("missing Start block: every flowchart begins with a Start node".into()),
        1 => {}
        n => report
            .errors
            .push(format!("{} Start blocks found: only one is allowed", n)),
    }

    if end_ids.is_empty() {
        report
            .errors
            .push("missing End block: every flowchart needs at least one End node".into());
    }

    if chart.nodes.len() < 2 {
        report
            .errors
            .push("flowchart is too small: add at least a Start and an End block".into());
    }

    if let [start_id] = start_ids[..] {
        if !chart.edges.iter().any(|e| e.source == start_id) {
            report
                .errors
                .push("the Start block has no outgoing connection".into());
        }
    }

    for node in &chart.nodes {
        if node.kind != NodeKind::End && !chart.edges.iter().any(|e| e.source == node.id) {
            report.warnings.push(format!(
                "block \"{}\" has no outgoing connection",
                node_name(chart, &node.id)
            ));
        }
        if node.kind != NodeKind::Start && !chart.edges.iter().any(|e| e.target == node.id) {
            report.warnings.push(format!(
                "block \"{}\" has no incoming connection (orphan)",
                node_name(chart, &node.id)
            ));
        }
    }

    for node in chart.nodes.iter().filter(|n| n.kind == NodeKind::Decision) {
        let outgoing: Vec<_> = chart.edges.iter().filter(|e| e.source == node.id).collect();
        let has_true = outgoing
            .iter()
            .any(|e| e.source_handle.as_deref() == Some("true"));
        let has_false = outgoing
            .iter()
            .any(|e| e.source_handle.as_deref() == Some("false"));
        let name = node_name(chart, &node.id);
        if !has_true && !has_false {
            report.errors.push(format!(
                "Decision block \"{}\" has no outgoing connection",
                name
            ));
        } else if !has_true {
            report
                .warnings
                .push(format!("Decision block \"{}\" has no True branch", name));
        } else if !has_false {
            report
                .warnings
                .push(format!("Decision block \"{}\" has no False branch", name));
        }
    }

    if let [start_id] = start_ids[..] {
        if !end_ids.is_empty() && !reaches_any_end(chart, start_id, &end_ids) {
            report.errors.push(
                "the Start block cannot reach any End block: check the connections".into(),
            );
        }
    }

    if !report.is_valid() {
        tracing::debug!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "flowchart failed validation"
        );
    }

    report
}

fn reaches_any_end(chart: &Flowchart, start_id: &str, end_ids: &[&str]) -> bool {
    let mut graph = DiGraph::<(), ()>::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for node in &chart.nodes {
        index.insert(node.id.as_str(), graph.add_node(()));
    }
    for edge in &chart.edges {
        if let (Some(&from), Some(&to)) = (
            index.get(edge.source.as_str()),
            index.get(edge.target.as_str()),
        ) {
            graph.add_edge(from, to, ());
        }
    }

    let Some(&start) = index.get(start_id) else {
        return false;
    };
    end_ids
        .iter()
        .filter_map(|id| index.get(*id))
        .any(|&end| has_path_connecting(&graph, start, end, None))
}
