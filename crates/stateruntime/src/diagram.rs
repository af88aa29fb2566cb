//! Text renderings of a finalized graph.
//!
//! Both renderers only read structure: node names, declared types, dead-end
//! flags, transitions and the entry/exit markers.

use crate::StateGraph;
use statecore::{NodeId, StateNode};
use std::collections::HashMap;
use std::fmt::Write;

/// Which nodes to mark as the graph's entry and exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagramMarkers {
    pub entry: Option<NodeId>,
    pub exit: Option<NodeId>,
}

impl DiagramMarkers {
    pub fn new(entry: NodeId, exit: NodeId) -> Self {
        Self {
            entry: Some(entry),
            exit: Some(exit),
        }
    }
}

/// Graphviz `digraph` with one box per node.
pub fn to_dot(graph: &StateGraph, markers: DiagramMarkers) -> String {
    let ids = short_ids(graph);
    let mut out = String::new();
    out.push_str("digraph states {\n");
    out.push_str("    rankdir=LR;\n");
    out.push_str("    node [shape=box, fontname=\"Helvetica\"];\n");

    for node in graph.nodes() {
        let label = format!(
            "{}\\n{} -> {}",
            sanitize_dot(node.name()),
            sanitize_dot(&node.input_type().short_name()),
            sanitize_dot(&node.output_type().short_name())
        );
        let mut attrs = vec![format!("label=\"{}\"", label)];
        let mut styles = Vec::new();
        if markers.entry == Some(node.id()) {
            styles.push("filled");
            attrs.push("fillcolor=palegreen".to_string());
        } else if markers.exit == Some(node.id()) {
            styles.push("filled");
            attrs.push("fillcolor=lightblue".to_string());
        }
        if node.is_dead_end() {
            styles.push("dashed");
        }
        if !styles.is_empty() {
            attrs.push(format!("style=\"{}\"", styles.join(",")));
        }
        let _ = writeln!(out, "    {} [{}];", ids[&node.id()], attrs.join(", "));
    }

    for node in graph.nodes() {
        for transition in node.transitions() {
            let Some(target) = ids.get(&transition.target()) else {
                continue;
            };
            match transition.label() {
                Some(label) => {
                    let _ = writeln!(
                        out,
                        "    {} -> {} [label=\"{}\"];",
                        ids[&node.id()],
                        target,
                        sanitize_dot(label)
                    );
                }
                None => {
                    let _ = writeln!(out, "    {} -> {};", ids[&node.id()], target);
                }
            }
        }
    }
    out.push_str("}\n");
    out
}

/// Mermaid `stateDiagram-v2` with entry and terminal pseudo-states.
pub fn to_mermaid(graph: &StateGraph, markers: DiagramMarkers) -> String {
    let ids = short_ids(graph);
    let mut out = String::new();
    out.push_str("stateDiagram-v2\n");

    for node in graph.nodes() {
        let _ = writeln!(
            out,
            "    state \"{}\" as {}",
            mermaid_label(node),
            ids[&node.id()]
        );
    }
    if let Some(entry) = markers.entry.and_then(|id| ids.get(&id)) {
        let _ = writeln!(out, "    [*] --> {}", entry);
    }
    for node in graph.nodes() {
        for transition in node.transitions() {
            let Some(target) = ids.get(&transition.target()) else {
                continue;
            };
            match transition.label() {
                Some(label) => {
                    let _ = writeln!(
                        out,
                        "    {} --> {} : {}",
                        ids[&node.id()],
                        target,
                        sanitize_mermaid(label)
                    );
                }
                None => {
                    let _ = writeln!(out, "    {} --> {}", ids[&node.id()], target);
                }
            }
        }
    }
    if let Some(exit) = markers.exit.and_then(|id| ids.get(&id)) {
        let _ = writeln!(out, "    {} --> [*]", exit);
    }
    for node in graph.nodes().filter(|n| n.is_dead_end()) {
        let _ = writeln!(out, "    note right of {} : dead end", ids[&node.id()]);
    }
    out
}

fn short_ids(graph: &StateGraph) -> HashMap<NodeId, String> {
    graph
        .nodes()
        .enumerate()
        .map(|(i, node)| (node.id(), format!("s{}", i)))
        .collect()
}

fn mermaid_label(node: &StateNode) -> String {
    format!(
        "{} ({} → {})",
        sanitize_mermaid(node.name()),
        sanitize_mermaid(&node.input_type().short_name()),
        sanitize_mermaid(&node.output_type().short_name())
    )
}

/// Escape quotes and backslashes, and replace angle brackets with square ones.
pub fn sanitize_dot(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '<' => out.push('['),
            '>' => out.push(']'),
            '\n' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

/// Mermaid spells generics as `Vec~i64~`; quotes, colons and newlines are
/// not allowed in labels.
pub fn sanitize_mermaid(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '<' | '>' => '~',
            '"' => '\'',
            ':' | '\n' => ' ',
            _ => ch,
        })
        .collect()
}
