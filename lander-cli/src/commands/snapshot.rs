//! Snapshot command: show what a landing URL attributes to.

use anyhow::Result;
use clap::Args;

use super::PageArgs;
use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub page: PageArgs,

    /// Also print the durable record that was persisted
    #[arg(long)]
    pub durable: bool,
}

pub fn run(args: SnapshotArgs) -> Result<()> {
    let config = ConfigLoader::load_runtime()?;
    let snapshot = args.page.compute(&config);

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    if let Some(token) = &snapshot.raf_token {
        println!("raf_token: {}", token);
    }
    if args.durable {
        println!("{}", serde_json::to_string_pretty(&snapshot.durable())?);
    }
    Ok(())
}
