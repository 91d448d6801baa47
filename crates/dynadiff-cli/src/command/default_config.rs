use std::path::PathBuf;

use dynadiff_engine::config::EngineConfig;

use crate::util::Output;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct DefaultConfigArg {
    /// Output file path (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &DefaultConfigArg) -> anyhow::Result<()> {
    let DefaultConfigArg { output } = arg;
    Output::save_json(&EngineConfig::default(), output.clone())
}
