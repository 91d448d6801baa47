use std::{fmt::Write as _, path::PathBuf, sync::Arc};

use dynadiff_engine::{
    calculator::{DifficultyCalculator, DifficultyResult},
    config::EngineConfig,
    snapshot::{PlayerSnapshot, StoredDifficulty},
};

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CalculateArg {
    /// Player snapshot JSON file
    #[arg(long)]
    player: PathBuf,
    /// Engine configuration JSON file (defaults if omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Current difficulty, overriding the value stored in the snapshot
    #[arg(long)]
    current: Option<f32>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
    /// Store the new difficulty back into the player snapshot file
    #[arg(long)]
    write_back: bool,
}

pub(crate) fn run(arg: &CalculateArg) -> anyhow::Result<()> {
    let CalculateArg {
        player,
        config,
        current,
        json,
        write_back,
    } = arg;

    let config = match config {
        Some(path) => util::read_json_file::<EngineConfig, _>("config", path)?,
        None => EngineConfig::default(),
    };
    let mut snapshot: PlayerSnapshot = util::read_json_file("player snapshot", player)?;
    if let Some(current) = current {
        snapshot.difficulty = Some(*current);
    }

    let stored = Arc::new(StoredDifficulty::new(snapshot.difficulty));
    let providers = snapshot.providers().with_difficulty(stored.clone());
    let calculator = DifficultyCalculator::new(config, &providers);
    tracing::debug!(signals = calculator.signals().len(), "calculator ready");

    let result = calculator.apply(&*stored);

    if *json {
        Output::stdout().write_json(&result)?;
    } else {
        print!("{}", render(&result));
    }

    // Only the difficulty is persisted; a defaulted `as_of` must never be frozen into the file
    if *write_back {
        util::replace_json_field("player snapshot", player, "difficulty", &stored.get())?;
        tracing::info!(
            path = %player.display(),
            difficulty = result.new_difficulty,
            "stored new difficulty"
        );
    }

    Ok(())
}

fn render(result: &DifficultyResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Difficulty: {:.2} -> {:.2} ({:+.2})",
        result.previous_difficulty,
        result.new_difficulty,
        result.delta()
    );
    let _ = writeln!(
        out,
        "Raw delta:  {:+.2} ({})",
        result.raw_delta, result.strategy
    );
    let _ = writeln!(out, "Reason:     {}", result.primary_reason);

    if !result.applied_signals.is_empty() {
        let _ = writeln!(out, "Applied signals:");
        for signal in &result.applied_signals {
            let _ = writeln!(
                out,
                "  {:<16} {:+.2}  {}",
                signal.name.to_string(),
                signal.value,
                signal.reason
            );
        }
    }
    if result.had_errors {
        let _ = writeln!(out, "Errors:");
        for message in &result.error_messages {
            let _ = writeln!(out, "  {message}");
        }
    }
    out
}
