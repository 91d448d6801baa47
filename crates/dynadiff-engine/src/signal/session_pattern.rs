use std::sync::Arc;

use crate::{
    config::{SessionPatternConfig, divisor, non_negative, unit_interval},
    provider::{QuitProvider, QuitType, SessionHistoryProvider, StreakProvider},
    signal::{EvaluationContext, Signal, SignalError, SignalId, SignalResult, ensure_finite},
};

/// Lowers difficulty when session durations and quits suggest frustration.
///
/// # Factors
///
/// All factors are penalties; their sum is capped at `max_total_penalty`.
///
/// | Factor                  | Condition                                           | Penalty                                   |
/// |-------------------------|-----------------------------------------------------|-------------------------------------------|
/// | Very short session      | `0 < current < very_short_session_threshold`        | `very_short_session_penalty`              |
/// | Short average session   | `0 < average < min_normal_session_duration`         | `short_average_penalty × shortfall_ratio` |
/// | Rage quit pattern       | `recent_rage_quits >= rage_quit_pattern_threshold`  | `rage_quit_pattern_penalty`               |
/// | Mid-level quit          | last quit was `MidPlay`                             | `mid_level_quit_penalty`                  |
/// | Short session ratio\*   | share of short sessions > threshold                 | `penalty × over_threshold_ratio`          |
/// | Mid-level quit ratio\*  | share of mid-level quits > threshold                | `penalty × over_threshold_ratio`          |
/// | Regression\*            | sessions shortened after the last increase          | `regression_penalty`                      |
///
/// \* requires a [`SessionHistoryProvider`].
///
/// `shortfall_ratio = (min_normal - average) / min_normal` and
/// `over_threshold_ratio = (ratio - threshold) / (1 - threshold)`.
///
/// # Oscillation Guard
///
/// A player alternating wins and losses (both streaks at most
/// `oscillation_streak_limit`, at least `oscillation_min_games` games played) is
/// treated as balanced rather than frustrated: the result keeps its direction but
/// its magnitude is capped at `oscillation_nudge`. This keeps difficulty from
/// flipping back and forth for a well-matched player. The guard needs a
/// [`StreakProvider`] and is skipped without one.
#[derive(Debug, Clone)]
pub struct SessionPatternSignal {
    config: SessionPatternConfig,
    quits: Arc<dyn QuitProvider>,
    history: Option<Arc<dyn SessionHistoryProvider>>,
    streaks: Option<Arc<dyn StreakProvider>>,
}

#[derive(Debug, Default)]
struct Penalties {
    total: f32,
    reasons: Vec<&'static str>,
}

impl Penalties {
    fn add(&mut self, penalty: f32, reason: &'static str) {
        if penalty > 0.0 {
            self.total += penalty;
            self.reasons.push(reason);
        }
    }
}

impl SessionPatternSignal {
    #[must_use]
    pub fn new(
        config: SessionPatternConfig,
        quits: Arc<dyn QuitProvider>,
        history: Option<Arc<dyn SessionHistoryProvider>>,
        streaks: Option<Arc<dyn StreakProvider>>,
    ) -> Self {
        Self {
            config,
            quits,
            history,
            streaks,
        }
    }

    fn over_threshold(ratio: f32, threshold: f32) -> f32 {
        let threshold = unit_interval(threshold);
        if ratio <= threshold {
            return 0.0;
        }
        ((ratio - threshold) / divisor(1.0 - threshold)).min(1.0)
    }

    fn current_session_penalties(&self, penalties: &mut Penalties) -> Result<f32, SignalError> {
        let config = &self.config;

        let current = self.quits.current_session_duration()?;
        if current > 0.0 && current < config.very_short_session_threshold {
            penalties.add(
                non_negative(config.very_short_session_penalty),
                "very short session",
            );
        }

        let average = self.quits.average_session_duration()?;
        let min_normal = divisor(config.min_normal_session_duration);
        if average > 0.0 && average < min_normal {
            let shortfall = (min_normal - average) / min_normal;
            penalties.add(
                non_negative(config.short_average_penalty) * shortfall,
                "short average sessions",
            );
        }

        let rage_quits = self.quits.recent_rage_quit_count()?;
        if config.rage_quit_pattern_threshold > 0 && rage_quits >= config.rage_quit_pattern_threshold
        {
            penalties.add(
                non_negative(config.rage_quit_pattern_penalty),
                "repeated rage quits",
            );
        }

        if self.quits.last_quit_type()? == Some(QuitType::MidPlay) {
            penalties.add(non_negative(config.mid_level_quit_penalty), "quit mid-level");
        }

        Ok(average)
    }

    #[expect(clippy::cast_precision_loss)]
    fn history_penalties(
        &self,
        history: &dyn SessionHistoryProvider,
        average: f32,
        ctx: &EvaluationContext,
        penalties: &mut Penalties,
    ) -> Result<(), SignalError> {
        let config = &self.config;
        let min_sessions = config.min_history_sessions.max(1) as usize;
        let min_normal = divisor(config.min_normal_session_duration);

        let durations = history.recent_session_durations()?;
        if durations.len() >= min_sessions {
            let short = durations.iter().filter(|d| **d < min_normal).count();
            let ratio = short as f32 / durations.len() as f32;
            let over = Self::over_threshold(ratio, config.short_session_ratio_threshold);
            penalties.add(
                non_negative(config.short_session_ratio_penalty) * over,
                "mostly short sessions",
            );
        }

        let quits = history.recent_quit_count()?;
        if quits as usize >= min_sessions {
            let mid_level = history.recent_mid_level_quit_count()?.min(quits);
            let ratio = mid_level as f32 / quits as f32;
            let over = Self::over_threshold(ratio, config.mid_level_quit_ratio_threshold);
            penalties.add(
                non_negative(config.mid_level_quit_ratio_penalty) * over,
                "frequent mid-level quits",
            );
        }

        // Sessions got shorter after the last difficulty increase
        if let (Some(before), Some(duration_before)) = (
            history.difficulty_before_last_adjustment()?,
            history.session_duration_before_last_adjustment()?,
        ) && ctx.current_difficulty > before
            && duration_before > 0.0
            && average > 0.0
        {
            let drop = (duration_before - average) / duration_before;
            if drop > unit_interval(config.regression_drop_ratio) {
                penalties.add(
                    non_negative(config.regression_penalty),
                    "sessions shortened after difficulty increase",
                );
            }
        }

        Ok(())
    }

    /// Returns `true` when the player alternates wins and losses steadily.
    fn is_oscillating(&self) -> Result<bool, SignalError> {
        let Some(streaks) = &self.streaks else {
            return Ok(false);
        };
        let limit = self.config.oscillation_streak_limit;
        Ok(streaks.win_streak()? <= limit
            && streaks.loss_streak()? <= limit
            && streaks.total_games()? >= self.config.oscillation_min_games)
    }
}

impl Signal for SessionPatternSignal {
    fn id(&self) -> SignalId {
        SignalId::SessionPattern
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
        let mut penalties = Penalties::default();
        let average = self.current_session_penalties(&mut penalties)?;
        if let Some(history) = &self.history {
            self.history_penalties(history.as_ref(), average, ctx, &mut penalties)?;
        }

        let uncapped = penalties.total;
        let mut value = -uncapped.min(non_negative(self.config.max_total_penalty));

        let oscillating = self.is_oscillating()?;
        if oscillating && value != 0.0 {
            let nudge = non_negative(self.config.oscillation_nudge);
            value = value.signum() * value.abs().min(nudge);
        }
        let value = ensure_finite(value, "session pattern adjustment")?;
        let value = if value == 0.0 { 0.0 } else { value };

        let reason = if penalties.reasons.is_empty() {
            "Normal session pattern".to_owned()
        } else {
            let mut reason = penalties.reasons.join(", ");
            if let Some(first) = reason.get_mut(..1) {
                first.make_ascii_uppercase();
            }
            if oscillating {
                reason.push_str(" (balanced win/loss pattern, nudge only)");
            }
            reason
        };

        Ok(SignalResult::new(self.id(), self.priority(), value, reason)
            .with_meta("raw_penalty", uncapped)
            .with_meta("factors", penalties.reasons.len())
            .with_meta("oscillating", oscillating)
            .with_meta("history", self.history.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{QuitSnapshot, SessionHistorySnapshot, StreakSnapshot};

    fn calm_quits() -> QuitSnapshot {
        QuitSnapshot {
            last_quit_type: Some(QuitType::Normal),
            current_session_duration: 600.0,
            average_session_duration: 600.0,
            recent_rage_quit_count: 0,
        }
    }

    fn evaluate(
        quits: QuitSnapshot,
        history: Option<SessionHistorySnapshot>,
        streaks: Option<StreakSnapshot>,
        current_difficulty: f32,
    ) -> SignalResult {
        SessionPatternSignal::new(
            SessionPatternConfig::default(),
            Arc::new(quits),
            history.map(|h| Arc::new(h) as Arc<dyn SessionHistoryProvider>),
            streaks.map(|s| Arc::new(s) as Arc<dyn StreakProvider>),
        )
        .evaluate(&EvaluationContext { current_difficulty })
        .unwrap()
    }

    #[test]
    fn test_normal_pattern() {
        let result = evaluate(calm_quits(), None, None, 5.0);
        assert!(result.is_no_change());
        assert_eq!(result.reason, "Normal session pattern");
    }

    #[test]
    fn test_very_short_session() {
        let quits = QuitSnapshot {
            current_session_duration: 30.0,
            ..calm_quits()
        };
        let result = evaluate(quits, None, None, 5.0);
        assert!((result.value + 0.3).abs() < 1e-6);
        assert_eq!(result.reason, "Very short session");
    }

    #[test]
    fn test_short_average_scaled_by_shortfall() {
        // (180 - 90) / 180 = 0.5 shortfall
        let quits = QuitSnapshot {
            average_session_duration: 90.0,
            ..calm_quits()
        };
        let result = evaluate(quits, None, None, 5.0);
        assert!((result.value + 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_rage_quit_pattern_and_mid_play() {
        let quits = QuitSnapshot {
            last_quit_type: Some(QuitType::MidPlay),
            recent_rage_quit_count: 3,
            ..calm_quits()
        };
        let result = evaluate(quits, None, None, 5.0);
        assert!((result.value + 0.7).abs() < 1e-6);
        assert_eq!(result.reason, "Repeated rage quits, quit mid-level");
    }

    #[test]
    fn test_history_short_session_ratio() {
        // 3 of 4 short: (0.75 - 0.5) / 0.5 = 0.5 → 0.4 × 0.5
        let history = SessionHistorySnapshot {
            recent_session_durations: vec![100.0, 120.0, 600.0, 90.0],
            ..SessionHistorySnapshot::default()
        };
        let result = evaluate(calm_quits(), Some(history), None, 5.0);
        assert!((result.value + 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_history_mid_level_quit_ratio() {
        // 4 of 5 quits mid-level: (0.8 - 0.3) / 0.7 → 0.3 × 0.714
        let history = SessionHistorySnapshot {
            recent_quit_count: 5,
            recent_mid_level_quit_count: 4,
            ..SessionHistorySnapshot::default()
        };
        let result = evaluate(calm_quits(), Some(history), None, 5.0);
        assert!((result.value + 0.3 * (0.5 / 0.7)).abs() < 1e-5);
    }

    #[test]
    fn test_regression_after_increase() {
        let history = SessionHistorySnapshot {
            difficulty_before_last_adjustment: Some(4.0),
            session_duration_before_last_adjustment: Some(1200.0),
            ..SessionHistorySnapshot::default()
        };
        let result = evaluate(calm_quits(), Some(history.clone()), None, 5.0);
        assert!((result.value + 0.3).abs() < 1e-6);

        // the last adjustment lowered difficulty: not a regression
        let result = evaluate(calm_quits(), Some(history), None, 3.0);
        assert!(result.is_no_change());
    }

    #[test]
    fn test_total_penalty_capped() {
        let quits = QuitSnapshot {
            last_quit_type: Some(QuitType::MidPlay),
            current_session_duration: 10.0,
            average_session_duration: 20.0,
            recent_rage_quit_count: 10,
        };
        let history = SessionHistorySnapshot {
            recent_session_durations: vec![10.0; 10],
            recent_quit_count: 10,
            recent_mid_level_quit_count: 10,
            ..SessionHistorySnapshot::default()
        };
        let result = evaluate(quits, Some(history), None, 5.0);
        assert!((result.value + 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_oscillation_guard_caps_magnitude() {
        let quits = QuitSnapshot {
            last_quit_type: Some(QuitType::MidPlay),
            current_session_duration: 10.0,
            recent_rage_quit_count: 5,
            ..calm_quits()
        };
        let streaks = StreakSnapshot {
            win_streak: 1,
            loss_streak: 1,
            total_wins: 6,
            total_losses: 6,
        };
        let result = evaluate(quits, None, Some(streaks), 5.0);
        assert!((result.value + 0.1).abs() < 1e-6);
        assert!(result.reason.ends_with("(balanced win/loss pattern, nudge only)"));
    }

    #[test]
    fn test_oscillation_guard_keeps_smaller_values() {
        // 10% shortfall: -0.05 stays below the nudge and is not raised to it
        let quits = QuitSnapshot {
            average_session_duration: 162.0,
            ..calm_quits()
        };
        let streaks = StreakSnapshot {
            win_streak: 1,
            loss_streak: 1,
            total_wins: 6,
            total_losses: 6,
        };
        let result = evaluate(quits, None, Some(streaks), 5.0);
        assert!((result.value + 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_oscillation_guard_needs_enough_games() {
        let quits = QuitSnapshot {
            recent_rage_quit_count: 5,
            ..calm_quits()
        };
        let streaks = StreakSnapshot {
            win_streak: 1,
            loss_streak: 1,
            total_wins: 3,
            total_losses: 3,
        };
        let result = evaluate(quits, None, Some(streaks), 5.0);
        assert!((result.value + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_oscillation_guard_keeps_zero() {
        let streaks = StreakSnapshot {
            win_streak: 2,
            loss_streak: 0,
            total_wins: 10,
            total_losses: 10,
        };
        let result = evaluate(calm_quits(), None, Some(streaks), 5.0);
        assert!(result.is_no_change());
    }
}
