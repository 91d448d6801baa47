use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dynadiff_engine::{
    aggregation::AggregationStrategy,
    calculator::DifficultyCalculator,
    config::{EngineConfig, LossStreakConfig, TimeDecayConfig, WinStreakConfig},
    provider::{ProviderError, Providers, QuitType, StreakProvider},
    signal::{
        EvaluationContext, LossStreakSignal, Signal as _, SignalId, SignalResult,
        TimeDecaySignal, WinStreakSignal,
    },
    snapshot::{PlayerSnapshot, QuitSnapshot, StreakSnapshot, TimeAwaySnapshot},
};

fn ctx() -> EvaluationContext {
    EvaluationContext {
        current_difficulty: 5.0,
    }
}

fn as_of() -> DateTime<Utc> {
    "2024-05-20T12:00:00Z".parse().unwrap()
}

#[test]
fn test_win_streak_of_five() {
    let config = WinStreakConfig {
        win_threshold: 3,
        step_size: 0.5,
        max_bonus: 2.0,
        use_acceleration: false,
        ..WinStreakConfig::default()
    };
    let streaks = StreakSnapshot {
        win_streak: 5,
        ..StreakSnapshot::default()
    };
    let result = WinStreakSignal::new(config, Arc::new(streaks))
        .evaluate(&ctx())
        .unwrap();
    assert!((result.value - 1.5).abs() < 1e-6);
}

#[test]
fn test_loss_streak_below_threshold() {
    let config = LossStreakConfig {
        loss_threshold: 2,
        ..LossStreakConfig::default()
    };
    let streaks = StreakSnapshot {
        loss_streak: 1,
        ..StreakSnapshot::default()
    };
    let result = LossStreakSignal::new(config, Arc::new(streaks))
        .evaluate(&ctx())
        .unwrap();
    assert!(result.is_no_change());
    assert_eq!(result.reason, "No loss streak");
}

#[test]
fn test_aggregation_of_mixed_signals() {
    let signals = [
        SignalResult::new(SignalId::WinStreak, 0, 1.5, "win"),
        SignalResult::new(SignalId::RageQuit, 3, -1.0, "rage"),
        SignalResult::new(SignalId::SessionPattern, 6, -0.5, "short"),
    ];
    let diminishing = AggregationStrategy::DiminishingReturns { factor: 0.6 }.aggregate(&signals);
    assert!((diminishing - 0.72).abs() < 1e-6);
    let sum = AggregationStrategy::SimpleSum.aggregate(&signals);
    assert!(sum.abs() < 1e-6);
}

#[test]
fn test_time_decay_after_three_days() {
    let config = TimeDecayConfig {
        grace_period_hours: 6.0,
        decay_per_day: 0.5,
        max_decay: 2.0,
        ..TimeDecayConfig::default()
    };
    let time = TimeAwaySnapshot {
        last_played_at: Some(as_of() - TimeDelta::days(3) - TimeDelta::hours(6)),
        as_of: as_of(),
    };
    let result = TimeDecaySignal::new(config, Arc::new(time))
        .evaluate(&ctx())
        .unwrap();
    assert!((result.value + 1.5).abs() < 1e-6);
}

#[test]
fn test_low_completion_rate() {
    let snapshot = PlayerSnapshot {
        streaks: Some(StreakSnapshot {
            total_wins: 2,
            total_losses: 8,
            ..StreakSnapshot::default()
        }),
        ..PlayerSnapshot::default()
    };
    let config = EngineConfig::default();
    let calculator = DifficultyCalculator::new(config.clone(), &snapshot.providers());
    let result = calculator.calculate_difficulty(5.0);

    let completion = result
        .applied_signals
        .iter()
        .find(|s| s.name == SignalId::CompletionRate)
        .unwrap();
    assert!((completion.value + config.completion_rate.low_completion_decrease).abs() < 1e-6);
    assert!(result.new_difficulty < 5.0);
}

#[test]
fn test_oscillation_guard_caps_session_pattern() {
    let snapshot = PlayerSnapshot {
        streaks: Some(StreakSnapshot {
            win_streak: 1,
            loss_streak: 1,
            total_wins: 6,
            total_losses: 6,
        }),
        quits: Some(QuitSnapshot {
            last_quit_type: Some(QuitType::RageQuit),
            current_session_duration: 30.0,
            average_session_duration: 600.0,
            recent_rage_quit_count: 3,
        }),
        ..PlayerSnapshot::default()
    };
    let calculator = DifficultyCalculator::new(EngineConfig::default(), &snapshot.providers());
    let result = calculator.calculate_difficulty(5.0);

    let pattern = result
        .applied_signals
        .iter()
        .find(|s| s.name == SignalId::SessionPattern)
        .unwrap();
    assert!((pattern.value + 0.1).abs() < 1e-6);
    // the rage quit signal itself is not affected by the guard
    assert_eq!(result.primary_reason, "Rage quit detected");
}

#[derive(Debug)]
struct BrokenStreaks;

impl StreakProvider for BrokenStreaks {
    fn win_streak(&self) -> Result<u32, ProviderError> {
        Err(ProviderError::Unavailable { what: "win streak" })
    }

    fn loss_streak(&self) -> Result<u32, ProviderError> {
        Ok(3)
    }

    fn total_wins(&self) -> Result<u32, ProviderError> {
        Ok(0)
    }

    fn total_losses(&self) -> Result<u32, ProviderError> {
        Ok(3)
    }
}

#[test]
fn test_failing_provider_does_not_abort() {
    let providers = Providers::new().with_streaks(Arc::new(BrokenStreaks));
    let calculator = DifficultyCalculator::new(EngineConfig::default(), &providers);
    let result = calculator.calculate_difficulty(5.0);

    assert!(result.had_errors);
    assert_eq!(result.error_messages.len(), 1);
    assert!(result.error_messages[0].starts_with("win_streak: "));
    assert_eq!(result.primary_reason, "Loss streak of 3");
    assert!(result.new_difficulty < 5.0);
}

#[test]
fn test_missing_providers_are_not_errors() {
    let snapshot = PlayerSnapshot {
        quits: Some(QuitSnapshot::default()),
        ..PlayerSnapshot::default()
    };
    let calculator = DifficultyCalculator::new(EngineConfig::default(), &snapshot.providers());
    let ids = calculator
        .signals()
        .iter()
        .map(|s| s.id())
        .collect::<Vec<_>>();
    assert_eq!(ids, [SignalId::RageQuit, SignalId::SessionPattern]);

    let result = calculator.calculate_difficulty(5.0);
    assert!(!result.had_errors);
    assert!(result.applied_signals.is_empty());
}

#[test]
fn test_disabled_signal_contributes_nothing() {
    let mut config = EngineConfig::default();
    config.win_streak.enabled = false;
    let snapshot = PlayerSnapshot {
        streaks: Some(StreakSnapshot {
            win_streak: 10,
            ..StreakSnapshot::default()
        }),
        ..PlayerSnapshot::default()
    };
    let result =
        DifficultyCalculator::new(config, &snapshot.providers()).calculate_difficulty(5.0);
    assert!(!result.had_errors);
    assert!(result.applied_signals.is_empty());
    assert!((result.new_difficulty - 5.0).abs() < f32::EPSILON);
}

#[test]
fn test_invalid_snapshot_value_is_reported() {
    let snapshot = PlayerSnapshot {
        quits: Some(QuitSnapshot {
            last_quit_type: Some(QuitType::Normal),
            average_session_duration: f32::NAN,
            ..QuitSnapshot::default()
        }),
        ..PlayerSnapshot::default()
    };
    let result = DifficultyCalculator::new(EngineConfig::default(), &snapshot.providers())
        .calculate_difficulty(5.0);
    assert!(result.had_errors);
    assert!(result.error_messages[0].starts_with("session_pattern: "));
    // rage quit still applies
    assert!((result.new_difficulty - 4.5).abs() < 1e-6);
}

#[test]
fn test_full_snapshot_from_json() {
    let snapshot: PlayerSnapshot = serde_json::from_str(
        r#"{
            "difficulty": 6.0,
            "streaks": { "win_streak": 0, "loss_streak": 4, "total_wins": 3, "total_losses": 9 },
            "time_away": { "last_played_at": "2024-05-15T12:00:00Z", "as_of": "2024-05-20T12:00:00Z" },
            "quits": {
                "last_quit_type": "mid_play",
                "current_session_duration": 45,
                "average_session_duration": 150,
                "recent_rage_quit_count": 1
            },
            "level_progress": {
                "current_level": 4,
                "attempts_on_current_level": 9,
                "average_completion_time": 420,
                "completion_time_ratio": 1.8,
                "completion_rate": 0.25,
                "current_level_difficulty": 3.0
            },
            "session_history": {
                "recent_session_durations": [60, 90, 300, 45],
                "recent_quit_count": 4,
                "recent_mid_level_quit_count": 3
            }
        }"#,
    )
    .unwrap();
    let calculator = DifficultyCalculator::new(EngineConfig::default(), &snapshot.providers());
    assert_eq!(calculator.signals().len(), 7);

    let result = calculator.apply(snapshot.providers().difficulty.as_deref().unwrap());
    assert!(!result.had_errors, "{:?}", result.error_messages);
    assert!((result.previous_difficulty - 6.0).abs() < f32::EPSILON);
    // everything points down, limited by the per-session cap
    assert!((result.new_difficulty - 4.0).abs() < 1e-6);
    assert!(result.applied_signals.iter().all(|s| s.value < 0.0));
    assert_eq!(result.applied_signals.len(), 6);
}
