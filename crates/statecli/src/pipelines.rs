//! Demo pipelines driven by the CLI. Every pipeline reads decimal text and
//! produces text, so they all bind as `TypedStateMachine<String, String>`.

use anyhow::{anyhow, Result};
use statecore::{FnNode, NodeError, NodeId, StateNode};
use statenodes::{DebugNode, FormatIntNode, ParseIntNode, ScaleNode, SumNode};
use stateruntime::StateGraph;

pub struct Pipeline {
    pub graph: StateGraph,
    pub entry: NodeId,
    pub exit: NodeId,
}

pub const PIPELINES: &[(&str, &str)] = &[
    ("double", "parse an integer, double it and print it"),
    ("collatz", "count the Collatz steps needed to reach 1 (loops until done)"),
    ("fanout", "double and triple an integer in parallel, printing both"),
    ("sum", "double and triple an integer in parallel, then sum both results"),
];

pub fn build(name: &str) -> Result<Pipeline> {
    match name {
        "double" => double(),
        "collatz" => collatz(),
        "fanout" => fanout(),
        "sum" => sum(),
        other => Err(anyhow!(
            "unknown pipeline '{}' (try `stateflow pipelines`)",
            other
        )),
    }
}

fn double() -> Result<Pipeline> {
    let mut graph = StateGraph::new();
    let parse = graph.add_node(StateNode::new(ParseIntNode));
    let double = graph.add_node(StateNode::new(ScaleNode::doubling()));
    let format = graph.add_node(StateNode::new(FormatIntNode).dead_end());
    graph.connect_always(parse, double)?;
    graph.connect_always(double, format)?;
    Ok(Pipeline {
        graph,
        entry: parse,
        exit: format,
    })
}

fn collatz() -> Result<Pipeline> {
    let mut graph = StateGraph::new();
    let parse = graph.add_node(StateNode::new(ParseIntNode));
    let step = graph.add_node(
        StateNode::new(FnNode::new(|(n, steps): (i64, u32)| {
            let next = if n % 2 == 0 {
                Some(n / 2)
            } else {
                n.checked_mul(3).and_then(|v| v.checked_add(1))
            };
            next.map(|v| (v, steps + 1))
                .ok_or_else(|| NodeError::ExecutionFailed(format!("{} overflows", n)))
        }))
        .with_name("collatz step"),
    );
    let report = graph.add_node(
        StateNode::new(FnNode::new(|(_, steps): (i64, u32)| {
            Ok::<_, NodeError>(format!("reached 1 after {} step(s)", steps))
        }))
        .with_name("report")
        .dead_end(),
    );

    graph
        .connect_converting(parse, step, |n: &i64| *n > 1, |n: &i64| (*n, 0u32))?
        .set_label("n > 1");
    graph
        .connect_converting(parse, report, |n: &i64| *n == 1, |n: &i64| (*n, 0u32))?
        .set_label("n = 1");
    graph
        .connect(step, step, |(n, _): &(i64, u32)| *n != 1)?
        .set_label("n != 1");
    graph
        .connect(step, report, |(n, _): &(i64, u32)| *n == 1)?
        .set_label("n = 1");
    Ok(Pipeline {
        graph,
        entry: parse,
        exit: report,
    })
}

fn fanout() -> Result<Pipeline> {
    let mut graph = StateGraph::new();
    let parse = graph.add_node(StateNode::new(ParseIntNode).with_parallel_transitions());
    let double = graph.add_node(StateNode::new(ScaleNode::doubling()));
    let triple = graph.add_node(StateNode::new(ScaleNode::new(3)));
    let format = graph.add_node(StateNode::new(FormatIntNode).dead_end());
    graph.connect_always(parse, double)?;
    graph.connect_always(parse, triple)?;
    graph.connect_always(double, format)?;
    graph.connect_always(triple, format)?;
    Ok(Pipeline {
        graph,
        entry: parse,
        exit: format,
    })
}

fn sum() -> Result<Pipeline> {
    let mut graph = StateGraph::new();
    let parse = graph.add_node(StateNode::new(ParseIntNode).with_parallel_transitions());
    let double = graph.add_node(StateNode::new(ScaleNode::doubling()));
    let triple = graph.add_node(StateNode::new(ScaleNode::new(3)));
    let sum = graph.add_node(StateNode::combining(SumNode));
    let tap = graph.add_node(StateNode::new(DebugNode::<i64>::new("total")));
    let format = graph.add_node(StateNode::new(FormatIntNode).dead_end());
    graph.connect_always(parse, double)?;
    graph.connect_always(parse, triple)?;
    graph.connect_always(double, sum)?;
    graph.connect_always(triple, sum)?;
    graph.connect_always(sum, tap)?;
    graph.connect_always(tap, format)?;
    Ok(Pipeline {
        graph,
        entry: parse,
        exit: format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateruntime::{MachineConfig, TypedStateMachine};

    async fn run(name: &str, input: &str) -> Vec<String> {
        let pipeline = build(name).unwrap();
        let mut machine = TypedStateMachine::<String, String>::new(pipeline.graph, MachineConfig::default());
        machine.set_entry_node(pipeline.entry).unwrap();
        machine.set_exit_node(pipeline.exit).unwrap();
        machine.run(input.to_string()).await.unwrap()
    }

    #[tokio::test]
    async fn test_every_pipeline_builds_and_validates() {
        for (name, _) in PIPELINES {
            let pipeline = build(name).unwrap();
            let warnings = pipeline
                .graph
                .validate(pipeline.entry, Some(pipeline.exit))
                .unwrap();
            assert!(warnings.is_empty(), "{}: {:?}", name, warnings);
        }
        assert!(build("nope").is_err());
    }

    #[tokio::test]
    async fn test_pipeline_outputs() {
        assert_eq!(run("double", "42").await, vec!["84"]);
        assert_eq!(run("collatz", "6").await, vec!["reached 1 after 8 step(s)"]);
        assert_eq!(run("collatz", "1").await, vec!["reached 1 after 0 step(s)"]);
        assert_eq!(run("fanout", "5").await, vec!["10", "15"]);
        assert_eq!(run("sum", "5").await, vec!["25"]);
    }
}
