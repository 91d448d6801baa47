//! In-memory provider implementations.
//!
//! [`PlayerSnapshot`] is a serializable bundle of everything the providers expose.
//! Each section implements the matching provider trait, and
//! [`PlayerSnapshot::providers()`] wires in exactly the sections that are present.
//! Hosts that already keep player statistics elsewhere implement the provider
//! traits directly instead.
//!
//! ```
//! use dynadiff_engine::{calculator::DifficultyCalculator, config::EngineConfig, snapshot::PlayerSnapshot};
//!
//! let snapshot: PlayerSnapshot = serde_json::from_str(
//!     r#"{ "streaks": { "win_streak": 5, "total_wins": 5, "total_losses": 0 } }"#,
//! )
//! .unwrap();
//! let calculator = DifficultyCalculator::new(EngineConfig::default(), &snapshot.providers());
//! let result = calculator.calculate_difficulty(5.0);
//! assert!(result.new_difficulty > 5.0);
//! ```
//!
//! Values are validated when queried: negative or non-finite durations and rates
//! outside `[0, 1]` are reported as [`ProviderError::Invalid`].

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{
    DifficultyProvider, LevelProgressProvider, ProviderError, Providers, QuitProvider, QuitType,
    SessionHistoryProvider, StreakProvider, TimeProvider,
};

fn duration(value: f32, what: &'static str) -> Result<f32, ProviderError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ProviderError::Invalid {
            what,
            reason: format!("expected a non-negative duration, got {value}"),
        })
    }
}

fn rate(value: f32, what: &'static str) -> Result<f32, ProviderError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ProviderError::Invalid {
            what,
            reason: format!("expected a value in [0, 1], got {value}"),
        })
    }
}

/// Serializable snapshot of one player's behavior data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSnapshot {
    /// Stored difficulty, `None` before the first session.
    pub difficulty: Option<f32>,
    pub streaks: Option<StreakSnapshot>,
    pub time_away: Option<TimeAwaySnapshot>,
    pub quits: Option<QuitSnapshot>,
    pub level_progress: Option<LevelProgressSnapshot>,
    pub session_history: Option<SessionHistorySnapshot>,
}

impl PlayerSnapshot {
    /// Builds providers over the sections present in this snapshot.
    ///
    /// The difficulty provider is always present and starts at [`Self::difficulty`].
    #[must_use]
    pub fn providers(&self) -> Providers {
        let mut providers =
            Providers::new().with_difficulty(Arc::new(StoredDifficulty::new(self.difficulty)));
        if let Some(streaks) = self.streaks {
            providers = providers.with_streaks(Arc::new(streaks));
        }
        if let Some(time_away) = self.time_away {
            providers = providers.with_time(Arc::new(time_away));
        }
        if let Some(quits) = self.quits {
            providers = providers.with_quits(Arc::new(quits));
        }
        if let Some(level_progress) = self.level_progress {
            providers = providers.with_level_progress(Arc::new(level_progress));
        }
        if let Some(session_history) = &self.session_history {
            providers = providers.with_session_history(Arc::new(session_history.clone()));
        }
        providers
    }
}

/// Difficulty value shared between a host and the calculator.
#[derive(Debug, Default)]
pub struct StoredDifficulty(Mutex<Option<f32>>);

impl StoredDifficulty {
    #[must_use]
    pub fn new(difficulty: Option<f32>) -> Self {
        Self(Mutex::new(difficulty))
    }

    #[must_use]
    pub fn get(&self) -> Option<f32> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DifficultyProvider for StoredDifficulty {
    fn current_difficulty(&self) -> Result<Option<f32>, ProviderError> {
        Ok(self.get())
    }

    fn set_current_difficulty(&self, difficulty: f32) -> Result<(), ProviderError> {
        if !difficulty.is_finite() {
            return Err(ProviderError::Invalid {
                what: "difficulty",
                reason: format!("refusing to store {difficulty}"),
            });
        }
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(difficulty);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreakSnapshot {
    pub win_streak: u32,
    pub loss_streak: u32,
    pub total_wins: u32,
    pub total_losses: u32,
}

impl StreakProvider for StreakSnapshot {
    fn win_streak(&self) -> Result<u32, ProviderError> {
        Ok(self.win_streak)
    }

    fn loss_streak(&self) -> Result<u32, ProviderError> {
        Ok(self.loss_streak)
    }

    fn total_wins(&self) -> Result<u32, ProviderError> {
        Ok(self.total_wins)
    }

    fn total_losses(&self) -> Result<u32, ProviderError> {
        Ok(self.total_losses)
    }
}

/// Time away, measured between `last_played_at` and `as_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAwaySnapshot {
    #[serde(default)]
    pub last_played_at: Option<DateTime<Utc>>,
    /// Reference time; defaults to the time of deserialization.
    #[serde(default = "Utc::now")]
    pub as_of: DateTime<Utc>,
}

impl TimeProvider for TimeAwaySnapshot {
    fn last_played_at(&self) -> Result<Option<DateTime<Utc>>, ProviderError> {
        Ok(self.last_played_at)
    }

    fn time_since_last_play(&self) -> Result<TimeDelta, ProviderError> {
        Ok(self
            .last_played_at
            .map_or(TimeDelta::zero(), |last| (self.as_of - last).max(TimeDelta::zero())))
    }

    fn days_since_last_play(&self) -> Result<u32, ProviderError> {
        let days = self.time_since_last_play()?.num_days();
        Ok(u32::try_from(days).unwrap_or(u32::MAX))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuitSnapshot {
    pub last_quit_type: Option<QuitType>,
    /// Seconds.
    pub current_session_duration: f32,
    /// Seconds.
    pub average_session_duration: f32,
    pub recent_rage_quit_count: u32,
}

impl QuitProvider for QuitSnapshot {
    fn last_quit_type(&self) -> Result<Option<QuitType>, ProviderError> {
        Ok(self.last_quit_type)
    }

    fn current_session_duration(&self) -> Result<f32, ProviderError> {
        duration(self.current_session_duration, "current session duration")
    }

    fn average_session_duration(&self) -> Result<f32, ProviderError> {
        duration(self.average_session_duration, "average session duration")
    }

    fn recent_rage_quit_count(&self) -> Result<u32, ProviderError> {
        Ok(self.recent_rage_quit_count)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelProgressSnapshot {
    pub current_level: u32,
    pub attempts_on_current_level: u32,
    /// Seconds.
    pub average_completion_time: f32,
    /// Actual / expected completion time.
    pub completion_time_ratio: f32,
    pub completion_rate: f32,
    pub current_level_difficulty: f32,
}

impl LevelProgressProvider for LevelProgressSnapshot {
    fn current_level(&self) -> Result<u32, ProviderError> {
        Ok(self.current_level)
    }

    fn attempts_on_current_level(&self) -> Result<u32, ProviderError> {
        Ok(self.attempts_on_current_level)
    }

    fn average_completion_time(&self) -> Result<f32, ProviderError> {
        duration(self.average_completion_time, "average completion time")
    }

    fn completion_time_ratio(&self) -> Result<f32, ProviderError> {
        duration(self.completion_time_ratio, "completion time ratio")
    }

    fn completion_rate(&self) -> Result<f32, ProviderError> {
        rate(self.completion_rate, "level completion rate")
    }

    fn current_level_difficulty(&self) -> Result<f32, ProviderError> {
        if self.current_level_difficulty.is_finite() {
            Ok(self.current_level_difficulty)
        } else {
            Err(ProviderError::Invalid {
                what: "level difficulty",
                reason: "not a finite number".to_owned(),
            })
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionHistorySnapshot {
    /// Seconds, most recent last.
    pub recent_session_durations: Vec<f32>,
    pub recent_quit_count: u32,
    pub recent_mid_level_quit_count: u32,
    pub difficulty_before_last_adjustment: Option<f32>,
    pub session_duration_before_last_adjustment: Option<f32>,
}

impl SessionHistoryProvider for SessionHistorySnapshot {
    fn recent_session_durations(&self) -> Result<Vec<f32>, ProviderError> {
        self.recent_session_durations
            .iter()
            .map(|d| duration(*d, "recent session duration"))
            .collect()
    }

    fn recent_quit_count(&self) -> Result<u32, ProviderError> {
        Ok(self.recent_quit_count)
    }

    fn recent_mid_level_quit_count(&self) -> Result<u32, ProviderError> {
        Ok(self.recent_mid_level_quit_count)
    }

    fn difficulty_before_last_adjustment(&self) -> Result<Option<f32>, ProviderError> {
        Ok(self
            .difficulty_before_last_adjustment
            .filter(|d| d.is_finite()))
    }

    fn session_duration_before_last_adjustment(&self) -> Result<Option<f32>, ProviderError> {
        self.session_duration_before_last_adjustment
            .map(|d| duration(d, "session duration before last adjustment"))
            .transpose()
    }
}
