//! Link command: build installer and launcher links for a landing URL.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use lander_core::{ConfigOverrides, installer_url, launcher_url};

use super::PageArgs;
use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct LinkArgs {
    #[command(subcommand)]
    pub command: LinkCommands,
}

#[derive(Debug, Subcommand)]
pub enum LinkCommands {
    /// Download link for the installer
    Installer(InstallerArgs),
    /// App deep link for the launcher
    Launcher(LauncherArgs),
}

#[derive(Debug, Args)]
pub struct InstallerArgs {
    #[command(flatten)]
    pub page: PageArgs,

    /// Partner id (overrides config)
    #[arg(long)]
    pub partner_id: Option<String>,

    /// Extension id (overrides config)
    #[arg(long)]
    pub extension_id: Option<String>,
}

#[derive(Debug, Args)]
pub struct LauncherArgs {
    #[command(flatten)]
    pub page: PageArgs,

    /// Source used when the landing URL carries none
    #[arg(long)]
    pub fallback: Option<String>,
}

pub fn run(args: LinkArgs) -> Result<()> {
    match args.command {
        LinkCommands::Installer(args) => installer(args),
        LinkCommands::Launcher(args) => launcher(args),
    }
}

fn installer(args: InstallerArgs) -> Result<()> {
    let config = ConfigLoader::load_runtime()?.with_overrides(&ConfigOverrides {
        installer_partner_id: args.partner_id,
        installer_extension_id: args.extension_id,
        ..Default::default()
    });
    let snapshot = args.page.compute(&config);

    match installer_url(&config, &snapshot) {
        Some(url) => println!("{}", url),
        None => bail!("No installer partner id configured (set installer_partner_id or pass --partner-id)"),
    }
    Ok(())
}

fn launcher(args: LauncherArgs) -> Result<()> {
    let config = ConfigLoader::load_runtime()?.with_overrides(&ConfigOverrides {
        launcher_source_fallback: args.fallback,
        ..Default::default()
    });
    let snapshot = args.page.compute(&config);

    match launcher_url(&config, &snapshot) {
        Some(url) => println!("{}", url),
        None => bail!("No launcher base url configured"),
    }
    Ok(())
}
