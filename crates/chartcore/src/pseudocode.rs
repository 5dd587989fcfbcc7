use crate::{BranchLabel, Flowchart, Node, NodeId, NodeKind};
use std::collections::HashSet;

/// One rendered pseudocode line, tagged with the block it came from so
/// a host UI can link lines back to nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoLine {
    pub node_id: NodeId,
    pub indent: usize,
    pub text: String,
}

/// Translate a chart into structured pseudocode, one statement per
/// block. Traversal starts at the Start node and follows edges
/// depth-first; a block is emitted once, so back edges (loop bodies
/// wired into their loop node) terminate naturally. A chart without a
/// Start node yields no lines.
pub fn to_pseudocode(chart: &Flowchart) -> Vec<PseudoLine> {
    let mut converter = Converter {
        chart,
        lines: Vec::new(),
        visited: HashSet::new(),
        indent: 0,
    };
    if let Ok(start) = chart.find_start() {
        converter.convert(start);
    }
    converter.lines
}

/// Flatten pseudocode lines into displayable text, two spaces per
/// indent level.
pub fn render_pseudocode(lines: &[PseudoLine]) -> String {
    lines
        .iter()
        .map(|line| format!("{}{}", "  ".repeat(line.indent), line.text))
        .collect::<Vec<_>>()
        .join("\n")
}

struct Converter<'a> {
    chart: &'a Flowchart,
    lines: Vec<PseudoLine>,
    visited: HashSet<NodeId>,
    indent: usize,
}

impl Converter<'_> {
    fn convert(&mut self, node: &Node) {
        if !self.visited.insert(node.id.clone()) {
            return;
        }
        match node.kind {
            NodeKind::Start => {
                self.line(node.id.clone(), "BEGIN".to_string());
                self.follow(node);
            }
            NodeKind::End => {
                self.line(node.id.clone(), "END".to_string());
            }
            NodeKind::Input => {
                self.line(node.id.clone(), format!("READ {}", node.data.variable()));
                self.follow(node);
            }
            NodeKind::Output => {
                let expression = or_placeholder(node.data.expression(), "value");
                self.line(node.id.clone(), format!("WRITE {}", expression));
                self.follow(node);
            }
            NodeKind::Process => {
                let assignment = or_placeholder(node.data.expression(), "variable = value");
                self.line(node.id.clone(), assignment.to_string());
                self.follow(node);
            }
            NodeKind::Decision => self.convert_decision(node),
            NodeKind::While => self.convert_while(node),
            NodeKind::For => self.convert_for(node),
        }
    }

    fn convert_decision(&mut self, node: &Node) {
        let condition = or_placeholder(node.data.condition(), "condition");
        self.line(node.id.clone(), format!("IF {} THEN", condition));

        self.indent += 1;
        if let Some(next) = self.chart.next_node(&node.id, Some(BranchLabel::True)) {
            self.convert(next);
        }
        self.indent -= 1;

        if let Some(next) = self.chart.next_node(&node.id, Some(BranchLabel::False)) {
            self.line(format!("{}_else", node.id), "ELSE".to_string());
            self.indent += 1;
            self.convert(next);
            self.indent -= 1;
        }

        self.line(format!("{}_endif", node.id), "END IF".to_string());
    }

    fn convert_while(&mut self, node: &Node) {
        let condition = or_placeholder(node.data.condition(), "condition");
        self.line(node.id.clone(), format!("WHILE {} DO", condition));

        self.indent += 1;
        if let Some(body) = self.chart.next_node(&node.id, Some(BranchLabel::True)) {
            self.convert(body);
        }
        self.indent -= 1;

        self.line(format!("{}_endwhile", node.id), "END WHILE".to_string());

        // Execution continues past the loop through the false branch
        if let Some(next) = self.chart.next_node(&node.id, Some(BranchLabel::False)) {
            self.convert(next);
        }
    }

    fn convert_for(&mut self, node: &Node) {
        self.line(
            node.id.clone(),
            format!(
                "FOR {} FROM {} TO {} STEP {} DO",
                node.data.loop_variable(),
                node.data.loop_start(),
                node.data.loop_end(),
                node.data.loop_step(),
            ),
        );

        self.indent += 1;
        if let Some(body) = self.chart.next_node(&node.id, None) {
            self.convert(body);
        }
        self.indent -= 1;

        self.line(format!("{}_endfor", node.id), "END FOR".to_string());
    }

    fn follow(&mut self, node: &Node) {
        if let Some(next) = self.chart.next_node(&node.id, None) {
            self.convert(next);
        }
    }

    fn line(&mut self, node_id: NodeId, text: String) {
        self.lines.push(PseudoLine {
            node_id,
            indent: self.indent,
            text,
        });
    }
}

fn or_placeholder<'a>(text: &'a str, placeholder: &'a str) -> &'a str {
    if text.is_empty() {
        placeholder
    } else {
        text
    }
}
