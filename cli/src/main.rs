//! Kiln CLI - `kiln` command

use anyhow::Result;
use clap::Parser;
use kiln_cli::{Cli, default_collaborators, init_tracing};
use kiln_watch::{PathSpec, StopScope, WatchOrchestrator};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_tracing(config.options.debug);

    let collaborators = default_collaborators(&config);
    let mut orchestrator = WatchOrchestrator::new(config, collaborators);

    orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("Stopping");
    orchestrator.stop(StopScope::all()).await;

    Ok(())
}
