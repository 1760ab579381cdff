//! Binary entry point: parses configuration, wires the GitHub and Azure
//! Pipelines clients into the dispatch runtime, and serves webhooks until
//! interrupted.

mod bootstrap_helpers;
mod startup;

use anyhow::Result;
use clap::Parser;
use relay_cli::Cli;
use relay_runtime::run_webhook_server;

use crate::bootstrap_helpers::init_tracing;
use crate::startup::build_startup;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let startup = build_startup(&cli)?;
    run_webhook_server(startup.webhook, startup.runtime).await
}
