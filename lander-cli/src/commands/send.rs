//! Send command: fire one analytics beacon and report the collector's answer.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use lander_core::{BeaconDispatcher, MemoryTransport};
use tracing::info;

use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Event name (default: the configured page view event)
    pub event: Option<String>,

    /// Extra data as JSON
    #[arg(short, long, default_value = "{}")]
    pub extra: String,

    /// Collector endpoint (overrides config)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Print the beacon URL instead of sending it
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: SendArgs) -> Result<()> {
    let config = ConfigLoader::load_runtime()?;
    let extra: serde_json::Value =
        serde_json::from_str(&args.extra).context("--extra is not valid JSON")?;
    let event = args.event.unwrap_or_else(|| config.page_view_event.clone());

    // The dispatcher forms the URL; the request is made here so the
    // command can wait for it.
    let transport = MemoryTransport::new();
    let dispatcher = BeaconDispatcher::new(Arc::new(transport.clone()))
        .with_endpoint(config.analytics_endpoint());
    dispatcher.send(&event, &extra, args.endpoint.as_deref());

    let client = reqwest::Client::new();
    for url in transport.sent() {
        if args.dry_run {
            println!("{}", url);
            continue;
        }
        let response = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send beacon to {}", url))?;
        info!(event = %event, status = %response.status(), "Beacon sent");
        println!("{} {}", response.status(), url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    #[serial]
    async fn test_send_failure_names_the_requested_url() {
        let project = TempDir::new().unwrap();
        unsafe { std::env::set_var("LANDER_PROJECT_CONFIG_DIR", project.path()) };
        let result = run(SendArgs {
            event: Some("cta_click_event".into()),
            extra: "{}".into(),
            endpoint: Some("http://127.0.0.1:9/c".into()),
            dry_run: false,
        })
        .await;
        unsafe { std::env::remove_var("LANDER_PROJECT_CONFIG_DIR") };

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to send beacon to http://127.0.0.1:9/c?Name=cta_click_event"));
    }
}
