// crates/chartcli/src/main.rs

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chartcore::{
    render_pseudocode, to_pseudocode, validate, BranchLabel, Flowchart, Node, NodeKind,
};
use chartruntime::{Controller, FlowIo, RunConfig, RunOutcome, Speed};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Parser)]
#[command(name = "chart")]
#[command(about = "Flowchart interpreter CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a flowchart file
    Run {
        /// Path to flowchart JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Step pacing: instant, fast, normal or slow
        #[arg(short, long, default_value = "normal")]
        speed: String,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a flowchart file
    Validate {
        /// Path to flowchart JSON file
        file: PathBuf,
    },

    /// Print a flowchart as pseudocode
    Pseudocode {
        /// Path to flowchart JSON file
        file: PathBuf,
    },

    /// Create a new example flowchart
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flowchart.json")]
        output: PathBuf,
    },
}

/// Terminal-backed I/O bridge: trace lines go to stdout, Input nodes
/// read a line from stdin.
struct ConsoleIo {
    stdin: tokio::sync::Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleIo {
    fn new() -> Self {
        Self {
            stdin: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl FlowIo for ConsoleIo {
    fn log(&self, message: &str) {
        println!("{}", message);
    }

    async fn request_input(&self, prompt: &str) -> String {
        println!("❓ {}", prompt);
        let mut lines = self.stdin.lock().await;
        match lines.next_line().await {
            Ok(Some(line)) => line,
            // EOF or a broken terminal reads as an empty answer
            _ => String::new(),
        }
    }

    fn set_highlight(&self, node_id: Option<&str>) {
        if let Some(id) = node_id {
            tracing::debug!(node = id, "visiting node");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            speed,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::WARN)
                    .init();
            }

            let speed = Speed::from_str(&speed).map_err(|e| anyhow!(e))?;
            run_chart(file, speed).await?;
        }

        Commands::Validate { file } => {
            validate_chart(file)?;
        }

        Commands::Pseudocode { file } => {
            print_pseudocode(file)?;
        }

        Commands::Init { output } => {
            create_example_chart(output)?;
        }
    }

    Ok(())
}

async fn run_chart(file: PathBuf, speed: Speed) -> Result<()> {
    println!("🚀 Loading flowchart from: {}", file.display());

    let json = std::fs::read_to_string(&file)?;
    let chart = Flowchart::from_json(&json)?;

    println!(
        "📋 {} nodes, {} connections",
        chart.nodes.len(),
        chart.edges.len()
    );

    let report = validate(&chart);
    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }
    if !report.is_valid() {
        for error in &report.errors {
            println!("❌ {}", error);
        }
        return Err(anyhow!("flowchart failed validation"));
    }
    println!();

    let controller = Arc::new(Controller::new(
        chart,
        Arc::new(ConsoleIo::new()),
        RunConfig::with_speed(speed),
    ));

    // Ctrl-C stops the run instead of killing the process outright
    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                controller.stop();
            }
        });
    }

    let started = chrono::Local::now();
    let state = controller.start().await?;
    let elapsed = chrono::Local::now().signed_duration_since(started);

    println!();
    match state.outcome {
        Some(RunOutcome::Completed) => {
            println!("✨ Completed in {}ms", elapsed.num_milliseconds());
        }
        Some(RunOutcome::Stopped) => {
            println!("🛑 Stopped after {}ms", elapsed.num_milliseconds());
        }
        Some(RunOutcome::Failed) | None => {
            return Err(anyhow!(state
                .error
                .unwrap_or_else(|| "execution failed".to_string())));
        }
    }

    if !state.variables.is_empty() {
        println!();
        println!("📊 Final variables:");
        for (name, value) in &state.variables {
            println!("   {} = {}", name, value);
        }
    }

    Ok(())
}

fn validate_chart(file: PathBuf) -> Result<()> {
    println!("🔍 Validating flowchart: {}", file.display());

    let json = std::fs::read_to_string(&file)?;
    let chart = Flowchart::from_json(&json)?;
    let report = validate(&chart);

    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }
    for error in &report.errors {
        println!("❌ {}", error);
    }

    if report.is_valid() {
        println!(
            "✅ Flowchart is valid ({} nodes, {} connections)",
            chart.nodes.len(),
            chart.edges.len()
        );
        Ok(())
    } else {
        Err(anyhow!("flowchart failed validation"))
    }
}

fn print_pseudocode(file: PathBuf) -> Result<()> {
    let json = std::fs::read_to_string(&file)?;
    let chart = Flowchart::from_json(&json)?;
    let lines = to_pseudocode(&chart);
    if lines.is_empty() {
        return Err(anyhow!("flowchart has no Start block, nothing to render"));
    }
    println!("{}", render_pseudocode(&lines));
    Ok(())
}

fn create_example_chart(output: PathBuf) -> Result<()> {
    // Counter loop: print 1 through 5, then finish
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start).with_label("Start"));
    chart.add_node(
        Node::new("init", NodeKind::Process)
            .with_label("Initialize")
            .with_expression("i = 1"),
    );
    chart.add_node(
        Node::new("check", NodeKind::Decision)
            .with_label("i <= 5?")
            .with_condition("i <= 5"),
    );
    chart.add_node(
        Node::new("print", NodeKind::Output)
            .with_label("Print i")
            .with_expression("i"),
    );
    chart.add_node(
        Node::new("inc", NodeKind::Process)
            .with_label("Increment")
            .with_expression("i = i + 1"),
    );
    chart.add_node(Node::new("end", NodeKind::End).with_label("End"));
    chart.connect("start", "init");
    chart.connect("init", "check");
    chart.connect_branch("check", BranchLabel::True, "print");
    chart.connect("print", "inc");
    chart.connect("inc", "check");
    chart.connect_branch("check", BranchLabel::False, "end");

    std::fs::write(&output, chart.to_json()?)?;

    println!("✨ Created example flowchart: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  chart run --file {} --speed fast", output.display());

    Ok(())
}
