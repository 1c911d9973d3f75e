use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "lander", about = "Landing page attribution and CTA links")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the attribution snapshot for a landing URL
    Snapshot(commands::snapshot::SnapshotArgs),
    /// Build an installer or launcher link
    Link(commands::link::LinkArgs),
    /// Send an analytics beacon
    Send(commands::send::SendArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Snapshot(args) => commands::snapshot::run(args),
        Commands::Link(args) => commands::link::run(args),
        Commands::Send(args) => commands::send::run(args).await,
        Commands::Config(args) => commands::config::run(args),
    }
}
