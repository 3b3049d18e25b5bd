//! HexGraph CLI - inspect HEX label graphs and score vectors
//!
//! Usage:
//!   hexgraph <graph>                              # Build and summarize a graph
//!   hexgraph <graph> --list-states                # Print every consistent state
//!   hexgraph <graph> --scores 0,2,-1              # Partition function and marginals
//!   hexgraph <graph> --scores 0,2,-1 --label 1    # Loss and gradient for a label
//!   hexgraph <graph> ... -o json                  # Output as JSON

use std::process;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use hexgraph_core::layers::accuracy::rank_top_k;
use hexgraph_core::{
    infer, label_loss_and_gradient, load_label_graph, EnumerationConfig, GraphSourceConfig,
    HexError, Inference, LabelGraph, LossAndGradient, LossMode, PartitionStrategy,
    StateSpacePartition,
};

#[derive(Parser)]
#[command(name = "hexgraph")]
#[command(version)]
#[command(about = "HexGraph - exact inference over hierarchy and exclusion label graphs")]
struct Cli {
    /// Graph source file (`h child parent`, `e a b`, optional `nodes n`)
    #[arg(value_name = "GRAPH")]
    graph: String,

    /// Label name file, one name per line
    #[arg(short, long, value_name = "FILE")]
    labels: Option<String>,

    /// Number of labels (defaults to the `nodes` declaration or the largest
    /// index mentioned)
    #[arg(short, long, value_name = "N")]
    nodes: Option<u32>,

    /// State-space representation
    #[arg(long, value_enum, default_value_t = StrategyArg::Auto)]
    strategy: StrategyArg,

    /// Print every consistent state (flat representation only)
    #[arg(long)]
    list_states: bool,

    /// Comma-separated score vector, one value per label
    #[arg(short, long, value_name = "SCORES", allow_hyphen_values = true)]
    scores: Option<String>,

    /// Ground-truth label for loss and gradient
    #[arg(long, value_name = "LABEL", requires = "scores")]
    label: Option<i64>,

    /// Objective used with --label
    #[arg(long, value_enum, default_value_t = ModeArg::Joint)]
    mode: ModeArg,

    /// Number of top-ranked labels to show
    #[arg(short = 'k', long, default_value_t = 5)]
    top_k: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
    output: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Flat,
    JunctionTree,
    Auto,
}

impl From<StrategyArg> for PartitionStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Flat => PartitionStrategy::Flat,
            StrategyArg::JunctionTree => PartitionStrategy::JunctionTree,
            StrategyArg::Auto => PartitionStrategy::Auto,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Joint,
    Marginal,
}

impl From<ModeArg> for LossMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Joint => LossMode::Joint,
            ModeArg::Marginal => LossMode::Marginal,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Summary,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), HexError> {
    let node_count = match cli.nodes {
        Some(n) => n,
        None => hexgraph_frontend::load_graph_source(&cli.graph)?.implied_node_count(),
    };
    let mut source = GraphSourceConfig::new(&cli.graph, node_count);
    if let Some(labels) = &cli.labels {
        source = source.with_label_names(labels);
    }
    tracing::debug!(
        graph = %cli.graph,
        node_count,
        strategy = ?PartitionStrategy::from(cli.strategy),
        "graph source resolved"
    );
    let graph = load_label_graph(&source)?;
    let partition = StateSpacePartition::enumerate(
        Arc::clone(&graph),
        &EnumerationConfig::with_strategy(cli.strategy.into()),
    )?;

    let scores = cli.scores.as_deref().map(parse_scores).transpose()?;
    if let Some(scores) = &scores {
        tracing::debug!(entries = scores.len(), label = ?cli.label, "scoring");
    }
    let inference = scores
        .as_deref()
        .map(|s| infer(&partition, s))
        .transpose()?;
    let loss = match (cli.label, scores.as_deref()) {
        (Some(label), Some(s)) => Some(label_loss_and_gradient(
            &partition,
            s,
            label,
            cli.mode.into(),
        )?),
        _ => None,
    };

    match cli.output {
        OutputFormat::Json => {
            let states: Option<Vec<String>> = (cli.list_states)
                .then(|| partition.flat())
                .flatten()
                .map(|space| space.states().iter().map(|s| s.to_string()).collect());
            let report = json!({
                "partition": partition.summary(),
                "states": states,
                "inference": inference,
                "loss": loss,
            });
            match serde_json::to_string_pretty(&report) {
                Ok(text) => println!("{}", text),
                Err(e) => return Err(HexError::Config(format!("cannot serialize report: {e}"))),
            }
        }
        OutputFormat::Summary => {
            print_summary(&graph, &partition);
            if cli.list_states {
                print_states(&graph, &partition);
            }
            if let Some(inference) = &inference {
                print_inference(&graph, inference, cli.top_k);
            }
            if let (Some(loss), Some(label)) = (&loss, cli.label) {
                print_loss(&graph, loss, label);
            }
        }
    }
    Ok(())
}

fn parse_scores(text: &str) -> Result<Vec<f64>, HexError> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .map_err(|e| HexError::Config(format!("invalid score '{}': {}", t, e)))
        })
        .collect()
}

fn label_name(graph: &LabelGraph, index: usize) -> &str {
    graph
        .nodes()
        .get(index)
        .map(|n| n.name.as_ref())
        .unwrap_or("?")
}

fn print_summary(graph: &LabelGraph, partition: &StateSpacePartition) {
    let summary = partition.summary();
    println!(
        "✓ Graph built: {} labels, {} hierarchy edges, {} exclusion edges",
        graph.node_count(),
        graph.hierarchy_edge_count(),
        graph.exclusion_edge_count()
    );
    match (summary.states, summary.junction_tree) {
        (Some(states), _) => println!("  partition: flat, {} consistent states", states),
        (None, Some(tree)) => println!(
            "  partition: junction tree, {} cliques ({} roots), largest {} labels / {} states",
            tree.cliques, tree.roots, tree.max_clique_size, tree.max_clique_states
        ),
        (None, None) => println!("  partition: {}", summary.strategy),
    }
    if !summary.dead_labels.is_empty() {
        println!("\nDead labels ({}):", summary.dead_labels.len());
        for id in &summary.dead_labels {
            println!("  {} {}", id, label_name(graph, *id as usize));
        }
    }
}

fn print_states(graph: &LabelGraph, partition: &StateSpacePartition) {
    let Some(space) = partition.flat() else {
        println!("\nState listing needs the flat representation (use --strategy flat)");
        return;
    };
    println!("\nStates ({}):", space.len());
    for (i, state) in space.states().iter().enumerate() {
        let names: Vec<&str> = state.iter_true().map(|l| label_name(graph, l)).collect();
        println!("  {:>6}  {}  [{}]", i, state, names.join(", "));
    }
}

fn print_inference(graph: &LabelGraph, inference: &Inference, top_k: usize) {
    println!("\nlog Z = {:.6}", inference.log_partition);
    println!("Top labels:");
    for label in rank_top_k(&inference.marginals, top_k) {
        println!(
            "  {:>4} {:<24} {:.6}",
            label,
            label_name(graph, label),
            inference.marginals[label]
        );
    }
}

fn print_loss(graph: &LabelGraph, loss: &LossAndGradient, label: i64) {
    println!(
        "\nLoss for label {} ({}): {:.6}",
        label,
        label_name(graph, label as usize),
        loss.loss
    );
    println!("Gradient:");
    for (i, g) in loss.gradient.iter().enumerate() {
        println!("  {:>4} {:<24} {:+.6}", i, label_name(graph, i), g);
    }
}
