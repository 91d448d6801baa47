use std::sync::Arc;

use chrono::TimeDelta;

use crate::{
    config::{TimeDecayConfig, non_negative},
    provider::TimeProvider,
    signal::{EvaluationContext, Signal, SignalError, SignalId, SignalResult, ensure_finite},
};

/// Eases difficulty down after the player has been away.
///
/// # Formula
///
/// ```text
/// if first session or elapsed <= grace_period_hours: 0
/// value = -min(days_away × decay_per_day, max_decay)
/// ```
///
/// `days_away` is the provider's whole-day count, so time away shorter than a day
/// past the grace period yields no decay yet.
#[derive(Debug, Clone)]
pub struct TimeDecaySignal {
    config: TimeDecayConfig,
    time: Arc<dyn TimeProvider>,
}

impl TimeDecaySignal {
    #[must_use]
    pub fn new(config: TimeDecayConfig, time: Arc<dyn TimeProvider>) -> Self {
        Self { config, time }
    }
}

impl Signal for TimeDecaySignal {
    fn id(&self) -> SignalId {
        SignalId::TimeDecay
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    #[expect(clippy::cast_precision_loss)]
    fn evaluate(&self, _ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
        if self.time.last_played_at()?.is_none() {
            return Ok(SignalResult::no_change(
                self.id(),
                self.priority(),
                "First session",
            ));
        }

        let elapsed = self.time.time_since_last_play()?.max(TimeDelta::zero());
        let hours_away = elapsed.num_seconds() as f32 / 3600.0;
        let grace = non_negative(self.config.grace_period_hours);
        if hours_away <= grace {
            return Ok(SignalResult::no_change(
                self.id(),
                self.priority(),
                format!("Back within grace period ({})", describe_elapsed(elapsed)),
            )
            .with_meta("hours_away", hours_away));
        }

        let days_away = self.time.days_since_last_play()?;
        let decay = (days_away as f32 * non_negative(self.config.decay_per_day))
            .min(non_negative(self.config.max_decay));
        let value = ensure_finite(-decay, "time decay")?;
        // Keep -0.0 out of reports when no whole day has passed yet
        let value = if value == 0.0 { 0.0 } else { value };

        Ok(SignalResult::new(
            self.id(),
            self.priority(),
            value,
            format!("Away for {}", describe_elapsed(elapsed)),
        )
        .with_meta("hours_away", hours_away)
        .with_meta("days_away", days_away))
    }
}

/// Human-readable time away, on an hour, day or week scale.
fn describe_elapsed(elapsed: TimeDelta) -> String {
    fn plural(n: i64, unit: &str) -> String {
        if n == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    }

    if elapsed < TimeDelta::days(1) {
        plural(elapsed.num_hours(), "hour")
    } else if elapsed < TimeDelta::weeks(1) {
        plural(elapsed.num_days(), "day")
    } else {
        plural(elapsed.num_weeks(), "week")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::snapshot::TimeAwaySnapshot;

    fn as_of() -> DateTime<Utc> {
        "2024-05-20T12:00:00Z".parse().unwrap()
    }

    fn signal(elapsed: Option<TimeDelta>) -> TimeDecaySignal {
        let time = TimeAwaySnapshot {
            last_played_at: elapsed.map(|e| as_of() - e),
            as_of: as_of(),
        };
        TimeDecaySignal::new(TimeDecayConfig::default(), Arc::new(time))
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext {
            current_difficulty: 5.0,
        }
    }

    #[test]
    fn test_first_session() {
        let result = signal(None).evaluate(&ctx()).unwrap();
        assert!(result.is_no_change());
        assert_eq!(result.reason, "First session");
    }

    #[test]
    fn test_within_grace_period() {
        let result = signal(Some(TimeDelta::hours(5)))
            .evaluate(&ctx())
            .unwrap();
        assert!(result.is_no_change());
        assert!(result.reason.contains("5 hours"));
    }

    #[test]
    fn test_three_days_past_grace() {
        let elapsed = TimeDelta::days(3) + TimeDelta::hours(6);
        let result = signal(Some(elapsed)).evaluate(&ctx()).unwrap();
        assert!((result.value + 1.5).abs() < 1e-6);
        assert_eq!(result.reason, "Away for 3 days");
    }

    #[test]
    fn test_capped_at_max_decay() {
        let result = signal(Some(TimeDelta::weeks(3)))
            .evaluate(&ctx())
            .unwrap();
        assert!((result.value + 2.0).abs() < 1e-6);
        assert_eq!(result.reason, "Away for 3 weeks");
    }

    #[test]
    fn test_past_grace_but_under_a_day() {
        let result = signal(Some(TimeDelta::hours(10)))
            .evaluate(&ctx())
            .unwrap();
        assert!(result.is_no_change());
        assert!(result.value.is_sign_positive());
        assert_eq!(result.reason, "Away for 10 hours");
    }

    #[test]
    fn test_describe_elapsed_scales() {
        assert_eq!(describe_elapsed(TimeDelta::hours(1)), "1 hour");
        assert_eq!(describe_elapsed(TimeDelta::hours(30)), "1 day");
        assert_eq!(describe_elapsed(TimeDelta::days(6)), "6 days");
        assert_eq!(describe_elapsed(TimeDelta::days(15)), "2 weeks");
    }
}
