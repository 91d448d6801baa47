use std::sync::Arc;

use crate::{
    config::{LevelProgressConfig, MIN_DIVISOR, divisor, non_negative},
    provider::LevelProgressProvider,
    signal::{EvaluationContext, Signal, SignalError, SignalId, SignalResult, ensure_finite},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelFit {
    Mastery,
    Struggle,
}

/// Adjusts difficulty from metrics about the current level.
///
/// Four independent factors are summed:
///
/// 1. **Attempts** - every attempt above `high_attempts_threshold` subtracts
///    `decrease_per_attempt`, up to `max_attempts_penalty`.
/// 2. **Completion time** - with `r` = actual / expected time:
///    ```text
///    r < fast_completion_ratio → +fast_completion_bonus × min(fast_ratio / r, max_penalty_multiplier)
///    r > slow_completion_ratio → -slow_completion_penalty × min(r / slow_ratio, max_penalty_multiplier)
///    ```
/// 3. **Progression speed** - compares the current level with the level expected
///    after the estimated play time:
///    ```text
///    played_hours   = current_level × average_completion_time / 3600
///    expected_level = played_hours × expected_levels_per_hour
///    adjustment     = (current_level - expected_level) × progression_adjustment_per_level
///    ```
///    clamped to `±max_progression_adjustment`.
/// 4. **Mastery or struggle** - succeeding on a hard level adds `mastery_bonus`;
///    failing on an easy level subtracts `struggle_penalty`. At most one of the two
///    applies per evaluation.
#[derive(Debug, Clone)]
pub struct LevelProgressSignal {
    config: LevelProgressConfig,
    level_progress: Arc<dyn LevelProgressProvider>,
}

impl LevelProgressSignal {
    #[must_use]
    pub fn new(config: LevelProgressConfig, level_progress: Arc<dyn LevelProgressProvider>) -> Self {
        Self {
            config,
            level_progress,
        }
    }

    #[expect(clippy::cast_precision_loss)]
    fn attempts_factor(&self, attempts: u32) -> f32 {
        let extra = attempts.saturating_sub(self.config.high_attempts_threshold);
        if extra == 0 {
            return 0.0;
        }
        -(extra as f32 * non_negative(self.config.decrease_per_attempt))
            .min(non_negative(self.config.max_attempts_penalty))
    }

    fn completion_time_factor(&self, ratio: f32) -> f32 {
        if !ratio.is_finite() || ratio <= 0.0 {
            return 0.0;
        }
        let max_multiplier = non_negative(self.config.max_penalty_multiplier);
        let fast = non_negative(self.config.fast_completion_ratio);
        let slow = divisor(self.config.slow_completion_ratio);
        if ratio < fast {
            let multiplier = (fast / ratio.max(MIN_DIVISOR)).min(max_multiplier);
            non_negative(self.config.fast_completion_bonus) * multiplier
        } else if ratio > slow {
            let multiplier = (ratio / slow).min(max_multiplier);
            -non_negative(self.config.slow_completion_penalty) * multiplier
        } else {
            0.0
        }
    }

    #[expect(clippy::cast_precision_loss)]
    fn progression_factor(&self, current_level: u32, average_completion_time: f32) -> f32 {
        if !average_completion_time.is_finite()
            || average_completion_time <= 0.0
            || current_level < self.config.min_levels_for_speed
            || current_level == 0
        {
            return 0.0;
        }
        let level = current_level as f32;
        let played_hours = level * average_completion_time / 3600.0;
        let expected_level = played_hours * non_negative(self.config.expected_levels_per_hour);
        let limit = non_negative(self.config.max_progression_adjustment);
        ((level - expected_level) * non_negative(self.config.progression_adjustment_per_level))
            .clamp(-limit, limit)
    }

    fn mastery_factor(&self, level_difficulty: f32, completion_rate: f32) -> (f32, Option<LevelFit>) {
        let config = &self.config;
        if !level_difficulty.is_finite() || !completion_rate.is_finite() {
            return (0.0, None);
        }
        if level_difficulty >= config.hard_level_threshold
            && completion_rate > config.mastery_completion_rate
        {
            (non_negative(config.mastery_bonus), Some(LevelFit::Mastery))
        } else if level_difficulty <= config.easy_level_threshold
            && completion_rate < config.struggle_completion_rate
        {
            (-non_negative(config.struggle_penalty), Some(LevelFit::Struggle))
        } else {
            (0.0, None)
        }
    }
}

impl Signal for LevelProgressSignal {
    fn id(&self) -> SignalId {
        SignalId::LevelProgress
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn evaluate(&self, _ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
        let provider = &self.level_progress;
        let current_level = provider.current_level()?;
        let attempts = provider.attempts_on_current_level()?;
        let average_completion_time = provider.average_completion_time()?;
        let time_ratio = provider.completion_time_ratio()?;
        let completion_rate = provider.completion_rate()?;
        let level_difficulty = provider.current_level_difficulty()?;

        let attempts_adjustment = self.attempts_factor(attempts);
        let time_adjustment = self.completion_time_factor(time_ratio);
        let progression_adjustment = self.progression_factor(current_level, average_completion_time);
        let (mastery_adjustment, level_fit) =
            self.mastery_factor(level_difficulty, completion_rate);

        let value = ensure_finite(
            attempts_adjustment + time_adjustment + progression_adjustment + mastery_adjustment,
            "level progress adjustment",
        )?;

        let mut reasons = vec![];
        if attempts_adjustment != 0.0 {
            reasons.push(format!("{attempts} attempts on level {current_level}"));
        }
        if time_adjustment > 0.0 {
            reasons.push("completing levels quickly".to_owned());
        } else if time_adjustment < 0.0 {
            reasons.push("completing levels slowly".to_owned());
        }
        if progression_adjustment > 0.0 {
            reasons.push("progressing faster than expected".to_owned());
        } else if progression_adjustment < 0.0 {
            reasons.push("progressing slower than expected".to_owned());
        }
        match level_fit {
            Some(LevelFit::Mastery) => reasons.push("mastering hard levels".to_owned()),
            Some(LevelFit::Struggle) => reasons.push("struggling on easy levels".to_owned()),
            None => {}
        }
        let reason = if reasons.is_empty() {
            "Level progress as expected".to_owned()
        } else {
            let mut reason = reasons.join(", ");
            if let Some(first) = reason.get_mut(..1) {
                first.make_ascii_uppercase();
            }
            reason
        };

        Ok(SignalResult::new(self.id(), self.priority(), value, reason)
            .with_meta("current_level", current_level)
            .with_meta("attempts", attempts)
            .with_meta("attempts_adjustment", attempts_adjustment)
            .with_meta("time_adjustment", time_adjustment)
            .with_meta("progression_adjustment", progression_adjustment)
            .with_meta("mastery_adjustment", mastery_adjustment))
    }
}
