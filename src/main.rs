//! Romforge CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "romforge")]
#[command(about = "Incremental build planning for ROM hacks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project folder holding the config*.txt files (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a quick build against the previous build
    Plan,
    /// Print the steps of a full build
    BuildOrder,
    /// Print the resolved dependency graph as JSON
    Graph,
    /// List missing and arbitrary dependencies
    Check,
    /// Record the current inputs after an external build
    Record,
    /// Delete the build state next to the output
    Clear,
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("romforge={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Romforge v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Project root: {}", cli.root.display());

    match cli.command {
        Commands::Plan => commands::plan(&cli.root),
        Commands::BuildOrder => commands::build_order(&cli.root),
        Commands::Graph => commands::graph(&cli.root),
        Commands::Check => commands::check(&cli.root),
        Commands::Record => commands::record(&cli.root),
        Commands::Clear => commands::clear(&cli.root),
        Commands::Version => {
            println!("Romforge v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
