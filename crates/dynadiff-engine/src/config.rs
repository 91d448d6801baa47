//! Engine configuration.
//!
//! [`EngineConfig`] is the single root of all tunable parameters: global
//! [`DifficultySettings`] plus one parameter block per signal. Every struct
//! deserializes with `#[serde(default)]`, so a partial JSON document only needs
//! to name the values it overrides:
//!
//! ```
//! use dynadiff_engine::{aggregation::AggregationStrategy, config::EngineConfig};
//!
//! let config: EngineConfig = serde_json::from_str(
//!     r#"{
//!         "settings": { "max_change_per_session": 1.0, "aggregation": { "kind": "max_absolute" } },
//!         "win_streak": { "win_threshold": 4 }
//!     }"#,
//! )
//! .unwrap();
//! assert_eq!(config.settings.aggregation, AggregationStrategy::MaxAbsolute);
//! assert_eq!(config.win_streak.win_threshold, 4);
//! assert_eq!(config.loss_streak.loss_threshold, 2);
//! ```
//!
//! Values are validated by [`EngineConfig::sanitized()`], which the
//! [calculator](crate::calculator) applies to whatever it is given. Divisor-like
//! fields are floored at [`MIN_DIVISOR`], so a zeroed or negative config can never
//! produce a division by zero or a NaN.

use serde::{Deserialize, Serialize};

use crate::aggregation::AggregationStrategy;

/// Smallest value any divisor-like field may take.
pub const MIN_DIVISOR: f32 = 0.0001;

pub(crate) fn non_negative(value: f32) -> f32 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

pub(crate) fn divisor(value: f32) -> f32 {
    if value.is_finite() {
        value.max(MIN_DIVISOR)
    } else {
        MIN_DIVISOR
    }
}

pub(crate) fn unit_interval(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn acceleration(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(1.0, 1.5)
    } else {
        1.0
    }
}

/// Root configuration: global settings and one block per signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub settings: DifficultySettings,
    pub win_streak: WinStreakConfig,
    pub loss_streak: LossStreakConfig,
    pub time_decay: TimeDecayConfig,
    pub rage_quit: RageQuitConfig,
    pub completion_rate: CompletionRateConfig,
    pub level_progress: LevelProgressConfig,
    pub session_pattern: SessionPatternConfig,
}

impl EngineConfig {
    /// Returns a copy with every field forced into its valid domain.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            settings: self.settings.sanitized(),
            win_streak: self.win_streak.sanitized(),
            loss_streak: self.loss_streak.sanitized(),
            time_decay: self.time_decay.sanitized(),
            rage_quit: self.rage_quit.sanitized(),
            completion_rate: self.completion_rate.sanitized(),
            level_progress: self.level_progress.sanitized(),
            session_pattern: self.session_pattern.sanitized(),
        }
    }
}

/// Difficulty range, per-session limits and aggregation strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultySettings {
    pub min_difficulty: f32,
    pub max_difficulty: f32,
    /// Difficulty used for a player without a stored value.
    pub default_difficulty: f32,
    /// Largest allowed change of difficulty in one calculation.
    pub max_change_per_session: f32,
    /// Signals with a smaller absolute value are not reported as applied.
    pub negligible_change: f32,
    pub aggregation: AggregationStrategy,
}

impl Default for DifficultySettings {
    fn default() -> Self {
        Self {
            min_difficulty: 1.0,
            max_difficulty: 10.0,
            default_difficulty: 5.0,
            max_change_per_session: 2.0,
            negligible_change: 0.001,
            aggregation: AggregationStrategy::default(),
        }
    }
}

impl DifficultySettings {
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let fallback = Self::default();
        let mut min = if self.min_difficulty.is_finite() {
            self.min_difficulty
        } else {
            fallback.min_difficulty
        };
        let mut max = if self.max_difficulty.is_finite() {
            self.max_difficulty
        } else {
            fallback.max_difficulty
        };
        if min > max {
            (min, max) = (max, min);
        }
        let default_difficulty = if self.default_difficulty.is_finite() {
            self.default_difficulty.clamp(min, max)
        } else {
            min + (max - min) / 2.0
        };
        Self {
            min_difficulty: min,
            max_difficulty: max,
            default_difficulty,
            max_change_per_session: non_negative(self.max_change_per_session),
            negligible_change: non_negative(self.negligible_change),
            aggregation: self.aggregation.sanitized(),
        }
    }

    /// Clamps `difficulty` into `[min_difficulty, max_difficulty]`.
    #[must_use]
    pub fn clamp(&self, difficulty: f32) -> f32 {
        difficulty.clamp(self.min_difficulty, self.max_difficulty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinStreakConfig {
    pub enabled: bool,
    pub priority: u32,
    /// Streak length at which the bonus starts.
    pub win_threshold: u32,
    /// Bonus per win at or beyond the threshold.
    pub step_size: f32,
    pub max_bonus: f32,
    pub use_acceleration: bool,
    /// Growth rate per win beyond the threshold, in `[1.0, 1.5]`.
    pub acceleration_factor: f32,
}

impl Default for WinStreakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 0,
            win_threshold: 3,
            step_size: 0.5,
            max_bonus: 2.0,
            use_acceleration: false,
            acceleration_factor: 1.15,
        }
    }
}

impl WinStreakConfig {
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            step_size: non_negative(self.step_size),
            max_bonus: non_negative(self.max_bonus),
            acceleration_factor: acceleration(self.acceleration_factor),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossStreakConfig {
    pub enabled: bool,
    pub priority: u32,
    pub loss_threshold: u32,
    pub step_size: f32,
    pub max_reduction: f32,
    pub use_acceleration: bool,
    pub acceleration_factor: f32,
}

impl Default for LossStreakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 1,
            loss_threshold: 2,
            step_size: 0.3,
            max_reduction: 1.5,
            use_acceleration: false,
            acceleration_factor: 1.15,
        }
    }
}

impl LossStreakConfig {
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            step_size: non_negative(self.step_size),
            max_reduction: non_negative(self.max_reduction),
            acceleration_factor: acceleration(self.acceleration_factor),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeDecayConfig {
    pub enabled: bool,
    pub priority: u32,
    /// Hours after the last session during which no decay applies.
    pub grace_period_hours: f32,
    pub decay_per_day: f32,
    pub max_decay: f32,
}

impl Default for TimeDecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 2,
            grace_period_hours: 6.0,
            decay_per_day: 0.5,
            max_decay: 2.0,
        }
    }
}

impl TimeDecayConfig {
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            grace_period_hours: non_negative(self.grace_period_hours),
            decay_per_day: non_negative(self.decay_per_day),
            max_decay: non_negative(self.max_decay),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RageQuitConfig {
    pub enabled: bool,
    pub priority: u32,
    pub rage_quit_penalty: f32,
    pub normal_quit_penalty: f32,
    pub mid_play_quit_penalty: f32,
}

impl Default for RageQuitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 3,
            rage_quit_penalty: 1.0,
            normal_quit_penalty: 0.5,
            mid_play_quit_penalty: 0.3,
        }
    }
}

impl RageQuitConfig {
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            rage_quit_penalty: non_negative(self.rage_quit_penalty),
            normal_quit_penalty: non_negative(self.normal_quit_penalty),
            mid_play_quit_penalty: non_negative(self.mid_play_quit_penalty),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionRateConfig {
    pub enabled: bool,
    pub priority: u32,
    /// Total wins + losses needed before the signal reacts.
    pub min_attempts_required: u32,
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub low_completion_decrease: f32,
    pub high_completion_increase: f32,
    /// Weight of the current level's completion rate in the blend, in `[0, 1]`.
    pub level_rate_weight: f32,
}

impl Default for CompletionRateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 4,
            min_attempts_required: 5,
            low_threshold: 0.4,
            high_threshold: 0.7,
            low_completion_decrease: 0.5,
            high_completion_increase: 0.5,
            level_rate_weight: 0.3,
        }
    }
}

impl CompletionRateConfig {
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            low_threshold: unit_interval(self.low_threshold),
            high_threshold: unit_interval(self.high_threshold),
            low_completion_decrease: non_negative(self.low_completion_decrease),
            high_completion_increase: non_negative(self.high_completion_increase),
            level_rate_weight: unit_interval(self.level_rate_weight),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelProgressConfig {
    pub enabled: bool,
    pub priority: u32,

    // Attempts on the current level
    pub high_attempts_threshold: u32,
    pub decrease_per_attempt: f32,
    pub max_attempts_penalty: f32,

    // Completion time relative to expectation (1.0 = as expected)
    pub fast_completion_ratio: f32,
    pub fast_completion_bonus: f32,
    pub slow_completion_ratio: f32,
    pub slow_completion_penalty: f32,
    /// Cap on how far the time factor can scale its bonus or penalty.
    pub max_penalty_multiplier: f32,

    // Progression speed
    pub expected_levels_per_hour: f32,
    pub min_levels_for_speed: u32,
    pub progression_adjustment_per_level: f32,
    pub max_progression_adjustment: f32,

    // Mastery / struggle
    pub hard_level_threshold: f32,
    pub easy_level_threshold: f32,
    pub mastery_completion_rate: f32,
    pub struggle_completion_rate: f32,
    pub mastery_bonus: f32,
    pub struggle_penalty: f32,
}

impl Default for LevelProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 5,
            high_attempts_threshold: 5,
            decrease_per_attempt: 0.1,
            max_attempts_penalty: 1.0,
            fast_completion_ratio: 0.7,
            fast_completion_bonus: 0.3,
            slow_completion_ratio: 1.5,
            slow_completion_penalty: 0.3,
            max_penalty_multiplier: 2.0,
            expected_levels_per_hour: 6.0,
            min_levels_for_speed: 3,
            progression_adjustment_per_level: 0.05,
            max_progression_adjustment: 0.5,
            hard_level_threshold: 7.0,
            easy_level_threshold: 3.0,
            mastery_completion_rate: 0.8,
            struggle_completion_rate: 0.3,
            mastery_bonus: 0.5,
            struggle_penalty: 0.5,
        }
    }
}

impl LevelProgressConfig {
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            decrease_per_attempt: non_negative(self.decrease_per_attempt),
            max_attempts_penalty: non_negative(self.max_attempts_penalty),
            fast_completion_ratio: non_negative(self.fast_completion_ratio),
            fast_completion_bonus: non_negative(self.fast_completion_bonus),
            slow_completion_ratio: divisor(self.slow_completion_ratio),
            slow_completion_penalty: non_negative(self.slow_completion_penalty),
            max_penalty_multiplier: non_negative(self.max_penalty_multiplier),
            expected_levels_per_hour: non_negative(self.expected_levels_per_hour),
            progression_adjustment_per_level: non_negative(self.progression_adjustment_per_level),
            max_progression_adjustment: non_negative(self.max_progression_adjustment),
            hard_level_threshold: if self.hard_level_threshold.is_finite() {
                self.hard_level_threshold
            } else {
                f32::MAX
            },
            easy_level_threshold: if self.easy_level_threshold.is_finite() {
                self.easy_level_threshold
            } else {
                f32::MIN
            },
            mastery_completion_rate: unit_interval(self.mastery_completion_rate),
            struggle_completion_rate: unit_interval(self.struggle_completion_rate),
            mastery_bonus: non_negative(self.mastery_bonus),
            struggle_penalty: non_negative(self.struggle_penalty),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPatternConfig {
    pub enabled: bool,
    pub priority: u32,

    /// Sessions shorter than this (seconds) count as very short.
    pub very_short_session_threshold: f32,
    pub very_short_session_penalty: f32,
    /// Average session duration (seconds) considered normal.
    pub min_normal_session_duration: f32,
    /// Penalty at a 100% shortfall; scaled by the shortfall ratio.
    pub short_average_penalty: f32,

    pub rage_quit_pattern_threshold: u32,
    pub rage_quit_pattern_penalty: f32,
    pub mid_level_quit_penalty: f32,

    // History based factors
    pub min_history_sessions: u32,
    pub short_session_ratio_threshold: f32,
    pub short_session_ratio_penalty: f32,
    pub mid_level_quit_ratio_threshold: f32,
    pub mid_level_quit_ratio_penalty: f32,
    /// Relative drop in average duration after a difficulty increase that counts as a regression.
    pub regression_drop_ratio: f32,
    pub regression_penalty: f32,

    pub max_total_penalty: f32,

    // Oscillation guard
    pub oscillation_streak_limit: u32,
    pub oscillation_min_games: u32,
    pub oscillation_nudge: f32,
}

impl Default for SessionPatternConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 6,
            very_short_session_threshold: 60.0,
            very_short_session_penalty: 0.3,
            min_normal_session_duration: 180.0,
            short_average_penalty: 0.5,
            rage_quit_pattern_threshold: 3,
            rage_quit_pattern_penalty: 0.5,
            mid_level_quit_penalty: 0.2,
            min_history_sessions: 3,
            short_session_ratio_threshold: 0.5,
            short_session_ratio_penalty: 0.4,
            mid_level_quit_ratio_threshold: 0.3,
            mid_level_quit_ratio_penalty: 0.3,
            regression_drop_ratio: 0.3,
            regression_penalty: 0.3,
            max_total_penalty: 1.5,
            oscillation_streak_limit: 2,
            oscillation_min_games: 10,
            oscillation_nudge: 0.1,
        }
    }
}

impl SessionPatternConfig {
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let ratio_threshold = |v: f32| unit_interval(v).min(1.0 - MIN_DIVISOR);
        Self {
            very_short_session_threshold: non_negative(self.very_short_session_threshold),
            very_short_session_penalty: non_negative(self.very_short_session_penalty),
            min_normal_session_duration: divisor(self.min_normal_session_duration),
            short_average_penalty: non_negative(self.short_average_penalty),
            rage_quit_pattern_penalty: non_negative(self.rage_quit_pattern_penalty),
            mid_level_quit_penalty: non_negative(self.mid_level_quit_penalty),
            min_history_sessions: self.min_history_sessions.max(1),
            short_session_ratio_threshold: ratio_threshold(self.short_session_ratio_threshold),
            short_session_ratio_penalty: non_negative(self.short_session_ratio_penalty),
            mid_level_quit_ratio_threshold: ratio_threshold(self.mid_level_quit_ratio_threshold),
            mid_level_quit_ratio_penalty: non_negative(self.mid_level_quit_ratio_penalty),
            regression_drop_ratio: unit_interval(self.regression_drop_ratio),
            regression_penalty: non_negative(self.regression_penalty),
            max_total_penalty: non_negative(self.max_total_penalty),
            oscillation_nudge: non_negative(self.oscillation_nudge),
            ..self.clone()
        }
    }
}
