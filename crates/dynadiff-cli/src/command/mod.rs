use clap::{Parser, Subcommand};

use self::{calculate::CalculateArg, default_config::DefaultConfigArg};
use crate::telemetry;

mod calculate;
mod default_config;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log level or filter directive, overridden by `RUST_LOG`
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Calculate the next difficulty for a player snapshot
    Calculate(#[clap(flatten)] CalculateArg),
    /// Print the default engine configuration as JSON
    DefaultConfig(#[clap(flatten)] DefaultConfigArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    telemetry::init(&args.log_level)?;
    match args.mode {
        Mode::Calculate(arg) => calculate::run(&arg)?,
        Mode::DefaultConfig(arg) => default_config::run(&arg)?,
    }
    Ok(())
}
