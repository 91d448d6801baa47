use std::sync::Arc;

use crate::{
    config::{CompletionRateConfig, non_negative, unit_interval},
    provider::{LevelProgressProvider, StreakProvider},
    signal::{EvaluationContext, Signal, SignalError, SignalId, SignalResult},
};

/// Compares the player's win rate against low and high bands.
///
/// # Formula
///
/// ```text
/// attempts = total_wins + total_losses
/// if attempts < min_attempts_required: 0
/// rate     = total_wins / attempts
/// blended  = rate × (1 - w) + level_completion_rate × w
/// blended < low_threshold  → -low_completion_decrease
/// blended > high_threshold → +high_completion_increase
/// ```
///
/// Without a level progress provider `w` is 0 and only the global rate is used.
#[derive(Debug, Clone)]
pub struct CompletionRateSignal {
    config: CompletionRateConfig,
    streaks: Arc<dyn StreakProvider>,
    level_progress: Option<Arc<dyn LevelProgressProvider>>,
}

impl CompletionRateSignal {
    #[must_use]
    pub fn new(
        config: CompletionRateConfig,
        streaks: Arc<dyn StreakProvider>,
        level_progress: Option<Arc<dyn LevelProgressProvider>>,
    ) -> Self {
        Self {
            config,
            streaks,
            level_progress,
        }
    }
}

impl Signal for CompletionRateSignal {
    fn id(&self) -> SignalId {
        SignalId::CompletionRate
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    #[expect(clippy::cast_precision_loss)]
    fn evaluate(&self, _ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
        let wins = self.streaks.total_wins()?;
        let losses = self.streaks.total_losses()?;
        let attempts = wins.saturating_add(losses);
        if attempts == 0 || attempts < self.config.min_attempts_required {
            return Ok(
                SignalResult::no_change(self.id(), self.priority(), "Not enough data")
                    .with_meta("attempts", attempts)
                    .with_meta("min_attempts", self.config.min_attempts_required),
            );
        }

        let rate = wins as f32 / attempts as f32;
        let (blended, level_rate) = match &self.level_progress {
            Some(level_progress) => {
                let level_rate = unit_interval(level_progress.completion_rate()?);
                let w = unit_interval(self.config.level_rate_weight);
                (rate * (1.0 - w) + level_rate * w, Some(level_rate))
            }
            None => (rate, None),
        };

        let (value, reason) = if blended < self.config.low_threshold {
            (
                -non_negative(self.config.low_completion_decrease),
                format!("Low completion rate ({:.0}%)", blended * 100.0),
            )
        } else if blended > self.config.high_threshold {
            (
                non_negative(self.config.high_completion_increase),
                format!("High completion rate ({:.0}%)", blended * 100.0),
            )
        } else {
            (
                0.0,
                format!("Completion rate within range ({:.0}%)", blended * 100.0),
            )
        };

        let mut result = SignalResult::new(self.id(), self.priority(), value, reason)
            .with_meta("attempts", attempts)
            .with_meta("win_rate", rate)
            .with_meta("blended_rate", blended);
        if let Some(level_rate) = level_rate {
            result = result.with_meta("level_rate", level_rate);
        }
        Ok(result)
    }
}
