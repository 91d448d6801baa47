//! Difficulty calculation pipeline.
//!
//! [`DifficultyCalculator`] owns a set of signals and a sanitized
//! [`EngineConfig`]. One call to [`DifficultyCalculator::calculate_difficulty()`]:
//!
//! 1. evaluates every enabled signal in ascending priority order (ties keep
//!    construction order),
//! 2. turns a failing signal into a zero-value result and records the error,
//! 3. aggregates all non-zero values with the configured
//!    [`AggregationStrategy`] into a raw delta,
//! 4. clamps `current + raw_delta` into the difficulty range,
//! 5. limits the change to `±max_change_per_session` (direction preserved),
//! 6. reports the signals with a non-negligible value and the reason of the
//!    strongest one.
//!
//! The calculator holds no state between calls. The same inputs always produce
//! the same [`DifficultyResult`].

use serde::{Deserialize, Serialize};

use crate::{
    aggregation::AggregationStrategy,
    config::EngineConfig,
    provider::{DifficultyProvider, Providers},
    signal::{BoxedSignal, EvaluationContext, Signal as _, SignalResult, build_signals},
};

/// Reason reported when no signal applied.
pub const NO_ADJUSTMENT_REASON: &str = "No adjustment needed";

/// Outcome of one difficulty calculation.
///
/// `new_difficulty` always lies in the configured range, and it never differs
/// from `previous_difficulty` by more than `max_change_per_session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyResult {
    /// Input difficulty after sanitization.
    pub previous_difficulty: f32,
    pub new_difficulty: f32,
    /// Aggregated delta before any clamping.
    pub raw_delta: f32,
    pub strategy: AggregationStrategy,
    /// Signals whose absolute value reached `negligible_change`, in evaluation order.
    pub applied_signals: Vec<SignalResult>,
    pub primary_reason: String,
    pub had_errors: bool,
    pub error_messages: Vec<String>,
}

impl DifficultyResult {
    /// Applied change, `new_difficulty - previous_difficulty`.
    #[must_use]
    pub fn delta(&self) -> f32 {
        self.new_difficulty - self.previous_difficulty
    }

    fn record_error(&mut self, message: String) {
        self.had_errors = true;
        self.error_messages.push(message);
    }
}

#[derive(Debug)]
pub struct DifficultyCalculator {
    config: EngineConfig,
    signals: Vec<BoxedSignal>,
}

impl DifficultyCalculator {
    /// Builds every signal supported by `providers`.
    #[must_use]
    pub fn new(config: EngineConfig, providers: &Providers) -> Self {
        let config = config.sanitized();
        let signals = build_signals(&config, providers);
        Self::with_signals(config, signals)
    }

    /// Uses the given signals as-is.
    #[must_use]
    pub fn with_signals(config: EngineConfig, mut signals: Vec<BoxedSignal>) -> Self {
        signals.sort_by_key(|s| s.priority());
        Self {
            config: config.sanitized(),
            signals,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Signals in evaluation order.
    #[must_use]
    pub fn signals(&self) -> &[BoxedSignal] {
        &self.signals
    }

    #[must_use]
    pub fn calculate_difficulty(&self, current_difficulty: f32) -> DifficultyResult {
        let settings = &self.config.settings;
        let previous = if current_difficulty.is_finite() {
            settings.clamp(current_difficulty)
        } else {
            settings.default_difficulty
        };

        let mut result = DifficultyResult {
            previous_difficulty: previous,
            new_difficulty: previous,
            raw_delta: 0.0,
            strategy: settings.aggregation,
            applied_signals: vec![],
            primary_reason: NO_ADJUSTMENT_REASON.to_owned(),
            had_errors: false,
            error_messages: vec![],
        };
        if !current_difficulty.is_finite() {
            result.record_error(format!(
                "current difficulty {current_difficulty} is not finite, using default {previous}"
            ));
        }

        let ctx = EvaluationContext {
            current_difficulty: previous,
        };
        let mut contributing = vec![];
        for signal in self.signals.iter().filter(|s| s.is_enabled()) {
            let id = signal.id();
            let evaluated = match signal.evaluate(&ctx) {
                Ok(evaluated) if evaluated.value.is_finite() => evaluated,
                Ok(evaluated) => {
                    tracing::warn!(
                        signal = %id,
                        value = evaluated.value,
                        "signal produced a non-finite value"
                    );
                    result.record_error(format!(
                        "{id}: produced non-finite value {}",
                        evaluated.value
                    ));
                    SignalResult::no_change(id, signal.priority(), "Non-finite value discarded")
                }
                Err(err) => {
                    tracing::warn!(signal = %id, %err, "signal evaluation failed");
                    result.record_error(format!("{id}: {err}"));
                    SignalResult::no_change(
                        id,
                        signal.priority(),
                        format!("Evaluation failed: {err}"),
                    )
                }
            };
            tracing::debug!(
                signal = %id,
                value = evaluated.value,
                reason = %evaluated.reason,
                "signal evaluated"
            );
            if evaluated.value != 0.0 {
                contributing.push(evaluated);
            }
        }

        let raw_delta = settings.aggregation.aggregate(&contributing);
        let raw_delta = if raw_delta.is_finite() {
            raw_delta
        } else {
            result.record_error(format!("aggregated delta {raw_delta} is not finite"));
            0.0
        };

        let target = settings.clamp(previous + raw_delta);
        let max_change = settings.max_change_per_session;
        let change = (target - previous).clamp(-max_change, max_change);

        result.raw_delta = raw_delta;
        result.new_difficulty = settings.clamp(previous + change);
        result.applied_signals = contributing
            .into_iter()
            .filter(|s| s.value.abs() >= settings.negligible_change)
            .collect();

        let mut primary: Option<&SignalResult> = None;
        for s in &result.applied_signals {
            if primary.is_none_or(|p| s.value.abs() > p.value.abs()) {
                primary = Some(s);
            }
        }
        if let Some(primary) = primary {
            result.primary_reason = primary.reason.clone();
        }

        tracing::debug!(
            previous = result.previous_difficulty,
            new = result.new_difficulty,
            raw_delta,
            strategy = %result.strategy,
            applied = result.applied_signals.len(),
            "difficulty calculated"
        );
        result
    }

    /// Reads the stored difficulty, calculates, and stores the new value.
    ///
    /// A missing stored value (first session) or a failing read falls back to
    /// `default_difficulty`. Read and write failures are recorded in the result.
    pub fn apply(&self, difficulty: &dyn DifficultyProvider) -> DifficultyResult {
        let default_difficulty = self.config.settings.default_difficulty;
        let mut read_error = None;
        let current = match difficulty.current_difficulty() {
            Ok(current) => current.unwrap_or(default_difficulty),
            Err(err) => {
                tracing::warn!(%err, "failed to read current difficulty");
                read_error = Some(format!("difficulty: {err}"));
                default_difficulty
            }
        };

        let mut result = self.calculate_difficulty(current);
        if let Some(message) = read_error {
            result.had_errors = true;
            result.error_messages.insert(0, message);
        }
        if let Err(err) = difficulty.set_current_difficulty(result.new_difficulty) {
            tracing::warn!(%err, "failed to store new difficulty");
            result.record_error(format!("difficulty: {err}"));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DifficultySettings,
        provider::ProviderError,
        signal::{Signal, SignalError, SignalId},
        snapshot::StoredDifficulty,
    };

    #[derive(Debug)]
    struct Fixed {
        id: SignalId,
        priority: u32,
        value: f32,
        enabled: bool,
    }

    impl Fixed {
        fn boxed(id: SignalId, priority: u32, value: f32) -> BoxedSignal {
            Box::new(Self {
                id,
                priority,
                value,
                enabled: true,
            })
        }
    }

    impl Signal for Fixed {
        fn id(&self) -> SignalId {
            self.id
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn evaluate(&self, _ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
            Ok(SignalResult::new(
                self.id,
                self.priority,
                self.value,
                format!("{} fired", self.id),
            ))
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl Signal for Failing {
        fn id(&self) -> SignalId {
            SignalId::LossStreak
        }

        fn priority(&self) -> u32 {
            1
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn evaluate(&self, _ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
            Err(ProviderError::Unavailable { what: "loss streak" }.into())
        }
    }

    fn config(aggregation: AggregationStrategy) -> EngineConfig {
        EngineConfig {
            settings: DifficultySettings {
                aggregation,
                ..DifficultySettings::default()
            },
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_no_signals() {
        let calculator = DifficultyCalculator::with_signals(EngineConfig::default(), vec![]);
        let result = calculator.calculate_difficulty(5.0);
        assert!((result.new_difficulty - 5.0).abs() < f32::EPSILON);
        assert!(result.applied_signals.is_empty());
        assert_eq!(result.primary_reason, NO_ADJUSTMENT_REASON);
        assert!(!result.had_errors);
    }

    #[test]
    fn test_change_limited_per_session() {
        let calculator = DifficultyCalculator::with_signals(
            config(AggregationStrategy::SimpleSum),
            vec![Fixed::boxed(SignalId::WinStreak, 0, 5.0)],
        );
        let result = calculator.calculate_difficulty(5.0);
        assert!((result.raw_delta - 5.0).abs() < f32::EPSILON);
        assert!((result.new_difficulty - 7.0).abs() < f32::EPSILON);
        assert!((result.delta() - 2.0).abs() < f32::EPSILON);

        let result = calculator.calculate_difficulty(9.5);
        assert!((result.new_difficulty - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_failure_is_isolated() {
        let calculator = DifficultyCalculator::with_signals(
            config(AggregationStrategy::SimpleSum),
            vec![
                Box::new(Failing) as BoxedSignal,
                Fixed::boxed(SignalId::WinStreak, 0, 1.0),
            ],
        );
        let result = calculator.calculate_difficulty(5.0);
        assert!(result.had_errors);
        assert_eq!(
            result.error_messages,
            ["loss_streak: provider query failed: loss streak is unavailable"]
        );
        assert!((result.new_difficulty - 6.0).abs() < f32::EPSILON);
        assert_eq!(result.applied_signals.len(), 1);
    }

    #[test]
    fn test_evaluation_order_and_primary_tie() {
        let calculator = DifficultyCalculator::with_signals(
            config(AggregationStrategy::SimpleSum),
            vec![
                Fixed::boxed(SignalId::SessionPattern, 6, -0.5),
                Fixed::boxed(SignalId::RageQuit, 3, 0.5),
                Fixed::boxed(SignalId::WinStreak, 0, 0.2),
            ],
        );
        let result = calculator.calculate_difficulty(5.0);
        let order = result
            .applied_signals
            .iter()
            .map(|s| s.name)
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            [SignalId::WinStreak, SignalId::RageQuit, SignalId::SessionPattern]
        );
        // equal magnitudes: the earlier signal wins
        assert_eq!(result.primary_reason, "rage_quit fired");
    }

    #[test]
    fn test_disabled_signals_are_skipped() {
        let disabled: BoxedSignal = Box::new(Fixed {
            id: SignalId::WinStreak,
            priority: 0,
            value: 1.0,
            enabled: false,
        });
        let calculator =
            DifficultyCalculator::with_signals(EngineConfig::default(), vec![disabled]);
        let result = calculator.calculate_difficulty(5.0);
        assert!(result.applied_signals.is_empty());
        assert!(result.raw_delta.abs() < f32::EPSILON);
    }

    #[test]
    fn test_negligible_values_still_aggregate() {
        let calculator = DifficultyCalculator::with_signals(
            config(AggregationStrategy::SimpleSum),
            vec![Fixed::boxed(SignalId::TimeDecay, 2, 0.0005)],
        );
        let result = calculator.calculate_difficulty(5.0);
        assert!(result.applied_signals.is_empty());
        assert_eq!(result.primary_reason, NO_ADJUSTMENT_REASON);
        assert!((result.raw_delta - 0.0005).abs() < 1e-7);
        assert!(result.new_difficulty > 5.0);
    }

    #[test]
    fn test_current_difficulty_is_sanitized() {
        let calculator = DifficultyCalculator::with_signals(EngineConfig::default(), vec![]);

        let result = calculator.calculate_difficulty(f32::NAN);
        assert!((result.previous_difficulty - 5.0).abs() < f32::EPSILON);
        assert!(result.had_errors);

        let result = calculator.calculate_difficulty(42.0);
        assert!((result.previous_difficulty - 10.0).abs() < f32::EPSILON);
        assert!((result.new_difficulty - 10.0).abs() < f32::EPSILON);
        assert!(!result.had_errors);
    }

    #[test]
    fn test_apply_stores_new_difficulty() {
        let calculator = DifficultyCalculator::with_signals(
            config(AggregationStrategy::SimpleSum),
            vec![Fixed::boxed(SignalId::LossStreak, 1, -1.0)],
        );
        let stored = StoredDifficulty::new(None);
        let result = calculator.apply(&stored);
        assert!((result.previous_difficulty - 5.0).abs() < f32::EPSILON);
        assert_eq!(stored.get(), Some(4.0));

        let result = calculator.apply(&stored);
        assert!((result.previous_difficulty - 4.0).abs() < f32::EPSILON);
        assert_eq!(stored.get(), Some(3.0));
    }
}
