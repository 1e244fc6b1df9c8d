//! `tapclock`: NFC time-clock agent.

#[cfg_attr(not(feature = "pcsc"), allow(dead_code))]
mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::TapclockConfig;

#[derive(Debug, Parser)]
#[command(name = "tapclock", version, about = "NFC time-clock agent")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
#[cfg_attr(not(feature = "pcsc"), allow(dead_code))]
enum Command {
    /// Stamp cards and serve program directives (default)
    Run,
    /// Write an identity onto the next presented card, then exit
    Program {
        /// Identity text, at most 16 characters are kept
        data: String,
    },
    /// List attached card readers
    Readers,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = TapclockConfig::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Command::Run);

    dispatch(command, config).await
}

#[cfg(feature = "pcsc")]
async fn dispatch(command: Command, config: TapclockConfig) -> Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use tapclock_hardware::PcscReader;

    use commands::shutdown_on_ctrl_c;

    let driver = Arc::new(PcscReader::establish().context("PC/SC service unavailable")?);

    match command {
        Command::Run => commands::run(driver, config, shutdown_on_ctrl_c()).await,
        Command::Program { data } => {
            commands::program(driver, config, &data, shutdown_on_ctrl_c()).await
        }
        Command::Readers => commands::readers(driver).await,
    }
}

#[cfg(not(feature = "pcsc"))]
async fn dispatch(command: Command, _config: TapclockConfig) -> Result<()> {
    let action = match command {
        Command::Run => "run the agent",
        Command::Program { .. } => "program a card",
        Command::Readers => "list readers",
    };
    anyhow::bail!("Cannot {action}: tapclock was built without PC/SC support (rebuild with `--features pcsc`)")
}
