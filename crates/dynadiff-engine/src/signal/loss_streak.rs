use std::sync::Arc;

use crate::{
    config::LossStreakConfig,
    provider::StreakProvider,
    signal::{
        EvaluationContext, Signal, SignalError, SignalId, SignalResult, ensure_finite,
        win_streak::streak_value,
    },
};

/// Lowers difficulty while the player keeps losing.
///
/// Mirror image of [`WinStreakSignal`](super::WinStreakSignal) with its own
/// threshold, step, maximum reduction and acceleration. The value is never positive.
#[derive(Debug, Clone)]
pub struct LossStreakSignal {
    config: LossStreakConfig,
    streaks: Arc<dyn StreakProvider>,
}

impl LossStreakSignal {
    #[must_use]
    pub fn new(config: LossStreakConfig, streaks: Arc<dyn StreakProvider>) -> Self {
        Self { config, streaks }
    }
}

impl Signal for LossStreakSignal {
    fn id(&self) -> SignalId {
        SignalId::LossStreak
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn evaluate(&self, _ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
        let streak = self.streaks.loss_streak()?;
        let threshold = self.config.loss_threshold;
        if streak < threshold {
            return Ok(
                SignalResult::no_change(self.id(), self.priority(), "No loss streak")
                    .with_meta("streak", streak)
                    .with_meta("threshold", threshold),
            );
        }

        let (magnitude, multiplier) = streak_value(
            streak,
            threshold,
            self.config.step_size,
            self.config.max_reduction,
            self.config
                .use_acceleration
                .then_some(self.config.acceleration_factor),
        );
        let value = ensure_finite(-magnitude, "loss streak reduction")?;

        Ok(SignalResult::new(
            self.id(),
            self.priority(),
            value,
            format!("Loss streak of {streak}"),
        )
        .with_meta("streak", streak)
        .with_meta("threshold", threshold)
        .with_meta("multiplier", multiplier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::StreakSnapshot;

    fn signal(loss_streak: u32, config: LossStreakConfig) -> LossStreakSignal {
        let streaks = StreakSnapshot {
            loss_streak,
            ..StreakSnapshot::default()
        };
        LossStreakSignal::new(config, Arc::new(streaks))
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext {
            current_difficulty: 5.0,
        }
    }

    #[test]
    fn test_no_loss_streak() {
        let config = LossStreakConfig {
            loss_threshold: 2,
            ..LossStreakConfig::default()
        };
        let result = signal(1, config).evaluate(&ctx()).unwrap();
        assert!(result.is_no_change());
        assert_eq!(result.reason, "No loss streak");
    }

    #[test]
    fn test_reduction_at_threshold() {
        let result = signal(2, LossStreakConfig::default())
            .evaluate(&ctx())
            .unwrap();
        assert!((result.value + 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_never_positive_and_capped() {
        let config = LossStreakConfig {
            use_acceleration: true,
            acceleration_factor: 1.5,
            ..LossStreakConfig::default()
        };
        let mut previous = 0.0_f32;
        for streak in 0..40 {
            let value = signal(streak, config.clone())
                .evaluate(&ctx())
                .unwrap()
                .value;
            assert!(value <= 0.0);
            assert!(value >= -config.max_reduction);
            assert!(value.abs() >= previous.abs());
            previous = value;
        }
        assert!((previous + config.max_reduction).abs() < 1e-6);
    }
}
