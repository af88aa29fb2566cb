// crates/statecli/src/main.rs

mod pipelines;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use statecore::{EventBus, MachineEvent, NodeId};
use stateruntime::{diagram, MachineConfig, TypedStateMachine};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stateflow")]
#[command(about = "State machine engine CLI", long_about = None)]
struct Cli {
    /// Path to a machine configuration JSON file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the number of invocations allowed in flight
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Record which processes each tick invoked
    #[arg(long, global = true)]
    record_steps: bool,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demo pipeline; more than one input runs a batch
    Run {
        /// Pipeline name
        pipeline: String,

        /// Inputs, one run each
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Print the outputs as a JSON array of arrays
        #[arg(long)]
        json: bool,
    },

    /// Render a pipeline's graph
    Diagram {
        /// Pipeline name
        pipeline: String,

        #[arg(short, long, value_enum, default_value_t = DiagramFormat::Dot)]
        format: DiagramFormat,
    },

    /// List available pipelines
    Pipelines,
}

#[derive(Clone, Copy, ValueEnum)]
enum DiagramFormat {
    Dot,
    Mermaid,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => MachineConfig::from_file(path)?,
        None => MachineConfig::default(),
    };
    if let Some(concurrency) = cli.concurrency {
        config = config.with_max_concurrency(concurrency);
    }
    if cli.record_steps {
        config = config.with_step_log();
    }
    config.validate()?;

    match cli.command {
        Commands::Run {
            pipeline,
            inputs,
            json,
        } => {
            run_pipeline(&pipeline, inputs, config, json).await?;
        }

        Commands::Diagram { pipeline, format } => {
            print_diagram(&pipeline, format)?;
        }

        Commands::Pipelines => {
            list_pipelines();
        }
    }

    Ok(())
}

async fn run_pipeline(name: &str, inputs: Vec<String>, config: MachineConfig, json: bool) -> Result<()> {
    let pipeline = pipelines::build(name)?;
    let names: HashMap<NodeId, String> = pipeline
        .graph
        .nodes()
        .map(|node| (node.id(), node.name().to_string()))
        .collect();

    println!("🚀 Pipeline: {}", name);
    println!("   Nodes: {}", pipeline.graph.len());
    println!("   Inputs: {}", inputs.len());
    println!();

    let bus = Arc::new(EventBus::new(config.event_buffer_size));
    let mut events = bus.subscribe();

    let event_task = tokio::spawn(async move {
        let name_of = |id: &NodeId| names.get(id).cloned().unwrap_or_else(|| id.to_string());
        while let Ok(event) = events.recv().await {
            match event {
                MachineEvent::RunStarted { run_id, .. } => {
                    println!("▶️  Run {} started", run_id);
                }
                MachineEvent::NodeInvoked {
                    node_name,
                    invocations,
                    failures,
                    duration_ms,
                    ..
                } => {
                    if failures == 0 {
                        println!("  ✅ {} x{} in {}ms", node_name, invocations, duration_ms);
                    } else {
                        println!(
                            "  ❌ {} x{}, {} failed, in {}ms",
                            node_name, invocations, failures, duration_ms
                        );
                    }
                }
                MachineEvent::NodeLog { node_id, message, .. } => {
                    println!("     ℹ️  [{}] {}", name_of(&node_id), message);
                }
                MachineEvent::Retrying {
                    node_id,
                    attempt,
                    error,
                    ..
                } => {
                    println!("     🔁 [{}] attempt {}: {}", name_of(&node_id), attempt, error);
                }
                MachineEvent::Unrouted { node_id, .. } => {
                    println!("     ⚠️  [{}] output matched no transition", name_of(&node_id));
                }
                MachineEvent::RunFinished {
                    run_id,
                    ticks,
                    duration_ms,
                    ..
                } => {
                    println!("✨ Run {} finished in {} tick(s), {}ms", run_id, ticks, duration_ms);
                }
                MachineEvent::RunCancelled { run_id, ticks, .. } => {
                    println!("🛑 Run {} cancelled after {} tick(s)", run_id, ticks);
                }
                MachineEvent::RunFailed { run_id, error, .. } => {
                    println!("💥 Run {} failed: {}", run_id, error);
                }
                _ => {}
            }
        }
    });

    let mut machine = TypedStateMachine::<String, String>::new(pipeline.graph, config)
        .with_sink(bus.clone());
    machine.set_entry_node(pipeline.entry)?;
    machine.set_exit_node(pipeline.exit)?;

    let result = if inputs.len() == 1 {
        let input = inputs.into_iter().next().ok_or_else(|| anyhow!("no input"))?;
        machine.run(input).await.map(|outputs| vec![outputs])
    } else {
        machine.run_batch(inputs).await
    };

    let step_log = machine.machine().step_log().cloned();

    // Closing the bus ends the listener once it has drained.
    drop(machine);
    drop(bus);
    let _ = event_task.await;

    if let Some(log) = step_log.filter(|log| !log.is_empty()) {
        println!();
        println!("🧾 Step Log:");
        for snapshot in log.ticks() {
            let invoked: Vec<String> = snapshot
                .invoked
                .iter()
                .map(|step| format!("{} (attempt {})", step.node_name, step.attempt))
                .collect();
            println!("   tick {}: {}", snapshot.tick, invoked.join(", "));
        }
    }

    let outputs = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
        return Ok(());
    }

    println!();
    println!("📤 Outputs:");
    for (index, outputs) in outputs.iter().enumerate() {
        println!("   #{}: {}", index, outputs.join(", "));
    }

    Ok(())
}

fn print_diagram(name: &str, format: DiagramFormat) -> Result<()> {
    let pipeline = pipelines::build(name)?;
    let markers = diagram::DiagramMarkers::new(pipeline.entry, pipeline.exit);
    let rendered = match format {
        DiagramFormat::Dot => diagram::to_dot(&pipeline.graph, markers),
        DiagramFormat::Mermaid => diagram::to_mermaid(&pipeline.graph, markers),
    };
    print!("{}", rendered);
    Ok(())
}

fn list_pipelines() {
    println!("📦 Available Pipelines:");
    println!();
    for (name, description) in pipelines::PIPELINES {
        println!("  • {}", name);
        println!("    {}", description);
    }
}
