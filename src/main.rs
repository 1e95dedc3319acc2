use anyhow::Result;
use clap::Parser;

mod api;
mod cli;
mod config;
mod engine;
mod ledger;
mod monitoring;
mod txn;

use cli::args::{Cli, Command};
use cli::context::{init_configs, init_tracing, load_configuration};

async fn run() -> Result<()> {
    let Cli {
        config: config_path,
        command,
    } = Cli::parse();
    let command = match command {
        Command::Init(args) => return init_configs(args),
        other => other,
    };

    let config = load_configuration(config_path)?;
    init_tracing(&config.global.logging)?;
    cli::run(command, config).await
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}
