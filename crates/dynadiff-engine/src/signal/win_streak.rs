use std::sync::Arc;

use crate::{
    config::{WinStreakConfig, non_negative},
    provider::StreakProvider,
    signal::{EvaluationContext, Signal, SignalError, SignalId, SignalResult, ensure_finite},
};

/// Raises difficulty while the player keeps winning.
///
/// # Formula
///
/// ```text
/// if streak < threshold: 0
/// value = (streak - threshold + 1) × step_size
/// with acceleration:  value *= acceleration_factor^(streak - threshold)
/// value = min(value, max_bonus)
/// ```
///
/// The value grows monotonically with the streak until it reaches `max_bonus`.
#[derive(Debug, Clone)]
pub struct WinStreakSignal {
    config: WinStreakConfig,
    streaks: Arc<dyn StreakProvider>,
}

impl WinStreakSignal {
    #[must_use]
    pub fn new(config: WinStreakConfig, streaks: Arc<dyn StreakProvider>) -> Self {
        Self { config, streaks }
    }
}

impl Signal for WinStreakSignal {
    fn id(&self) -> SignalId {
        SignalId::WinStreak
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn evaluate(&self, _ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
        let streak = self.streaks.win_streak()?;
        let threshold = self.config.win_threshold;
        if streak < threshold {
            return Ok(
                SignalResult::no_change(self.id(), self.priority(), "No win streak")
                    .with_meta("streak", streak)
                    .with_meta("threshold", threshold),
            );
        }

        let (value, multiplier) = streak_value(
            streak,
            threshold,
            self.config.step_size,
            self.config.max_bonus,
            self.config
                .use_acceleration
                .then_some(self.config.acceleration_factor),
        );
        let value = ensure_finite(value, "win streak bonus")?;

        Ok(SignalResult::new(
            self.id(),
            self.priority(),
            value,
            format!("Win streak of {streak}"),
        )
        .with_meta("streak", streak)
        .with_meta("threshold", threshold)
        .with_meta("multiplier", multiplier))
    }
}

/// Shared streak curve for win and loss streaks. Returns the unsigned magnitude and
/// the acceleration multiplier applied.
pub(super) fn streak_value(
    streak: u32,
    threshold: u32,
    step_size: f32,
    max_value: f32,
    acceleration: Option<f32>,
) -> (f32, f32) {
    let steps = streak.saturating_sub(threshold).saturating_add(1);
    let exponent = i32::try_from(streak.saturating_sub(threshold)).unwrap_or(i32::MAX);
    let multiplier = acceleration.map_or(1.0, |factor| factor.clamp(1.0, 1.5).powi(exponent));
    #[expect(clippy::cast_precision_loss)]
    let base = steps as f32 * non_negative(step_size);
    if base <= 0.0 {
        return (0.0, multiplier);
    }
    // an overflowing multiplier saturates at `max_value`
    let value = (base * multiplier).min(non_negative(max_value));
    (value, multiplier)
}
