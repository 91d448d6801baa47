//! Read-only data sources describing player behavior.
//!
//! The engine keeps no player history. Everything a [signal](crate::signal) needs
//! is queried from the narrow provider traits in this module, which the host
//! application implements over its own storage. A host may implement any subset:
//! signals whose required provider is absent are simply not built (see
//! [`build_signals()`](crate::signal::build_signals)).
//!
//! | Provider                   | Used by                                          |
//! |----------------------------|--------------------------------------------------|
//! | [`DifficultyProvider`]     | [`DifficultyCalculator::apply()`](crate::calculator::DifficultyCalculator::apply) |
//! | [`StreakProvider`]         | win streak, loss streak, completion rate, oscillation guard |
//! | [`TimeProvider`]           | time decay                                       |
//! | [`QuitProvider`]           | rage quit, session pattern                       |
//! | [`LevelProgressProvider`]  | level progress, completion rate (level blend)   |
//! | [`SessionHistoryProvider`] | session pattern (history factors)                |
//!
//! Providers must be safe for concurrent reads; the engine performs reads only,
//! except for [`DifficultyProvider::set_current_difficulty()`].

use std::{fmt, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ProviderError {
    #[display("{what} is unavailable")]
    Unavailable { what: &'static str },
    #[display("{what} is invalid: {reason}")]
    Invalid { what: &'static str, reason: String },
}

/// How the player's last session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case")]
pub enum QuitType {
    /// The session ended normally between levels.
    Normal,
    /// An abrupt, frustrated exit (typically right after a loss).
    RageQuit,
    /// The player left in the middle of a level.
    MidPlay,
}

/// The one scalar the host persists between sessions.
pub trait DifficultyProvider: fmt::Debug + Send + Sync {
    /// Returns the stored difficulty, or `None` before the first session.
    fn current_difficulty(&self) -> Result<Option<f32>, ProviderError>;

    fn set_current_difficulty(&self, difficulty: f32) -> Result<(), ProviderError>;
}

/// Win/loss streaks and lifetime totals.
pub trait StreakProvider: fmt::Debug + Send + Sync {
    fn win_streak(&self) -> Result<u32, ProviderError>;
    fn loss_streak(&self) -> Result<u32, ProviderError>;
    fn total_wins(&self) -> Result<u32, ProviderError>;
    fn total_losses(&self) -> Result<u32, ProviderError>;

    fn total_games(&self) -> Result<u32, ProviderError> {
        Ok(self.total_wins()?.saturating_add(self.total_losses()?))
    }
}

/// Time elapsed since the player last played.
pub trait TimeProvider: fmt::Debug + Send + Sync {
    /// Timestamp of the previous session, or `None` for a first session.
    fn last_played_at(&self) -> Result<Option<DateTime<Utc>>, ProviderError>;
    fn time_since_last_play(&self) -> Result<TimeDelta, ProviderError>;
    /// Whole days since the previous session.
    fn days_since_last_play(&self) -> Result<u32, ProviderError>;
}

/// Quit classification and session durations (seconds).
pub trait QuitProvider: fmt::Debug + Send + Sync {
    fn last_quit_type(&self) -> Result<Option<QuitType>, ProviderError>;
    fn current_session_duration(&self) -> Result<f32, ProviderError>;
    fn average_session_duration(&self) -> Result<f32, ProviderError>;
    fn recent_rage_quit_count(&self) -> Result<u32, ProviderError>;
}

/// Metrics about the level the player is currently on.
pub trait LevelProgressProvider: fmt::Debug + Send + Sync {
    fn current_level(&self) -> Result<u32, ProviderError>;
    fn attempts_on_current_level(&self) -> Result<u32, ProviderError>;
    /// Average level completion time in seconds (0 when unknown).
    fn average_completion_time(&self) -> Result<f32, ProviderError>;
    /// Actual completion time divided by the expected time (1.0 = as expected, 0 = no data).
    fn completion_time_ratio(&self) -> Result<f32, ProviderError>;
    /// Fraction of attempts on this level that were completed, in `[0, 1]`.
    fn completion_rate(&self) -> Result<f32, ProviderError>;
    /// The level's own difficulty rating.
    fn current_level_difficulty(&self) -> Result<f32, ProviderError>;
}

/// Optional extended history of recent sessions.
pub trait SessionHistoryProvider: fmt::Debug + Send + Sync {
    /// Durations (seconds) of recent sessions, most recent last.
    fn recent_session_durations(&self) -> Result<Vec<f32>, ProviderError>;
    fn recent_quit_count(&self) -> Result<u32, ProviderError>;
    fn recent_mid_level_quit_count(&self) -> Result<u32, ProviderError>;
    fn difficulty_before_last_adjustment(&self) -> Result<Option<f32>, ProviderError>;
    fn session_duration_before_last_adjustment(&self) -> Result<Option<f32>, ProviderError>;
}

/// The set of providers a host makes available.
///
/// Every handle is optional; see [`build_signals()`](crate::signal::build_signals)
/// for which signals require which providers.
#[derive(Debug, Clone, Default)]
pub struct Providers {
    pub difficulty: Option<Arc<dyn DifficultyProvider>>,
    pub streaks: Option<Arc<dyn StreakProvider>>,
    pub time: Option<Arc<dyn TimeProvider>>,
    pub quits: Option<Arc<dyn QuitProvider>>,
    pub level_progress: Option<Arc<dyn LevelProgressProvider>>,
    pub session_history: Option<Arc<dyn SessionHistoryProvider>>,
}

impl Providers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_difficulty(mut self, provider: Arc<dyn DifficultyProvider>) -> Self {
        self.difficulty = Some(provider);
        self
    }

    #[must_use]
    pub fn with_streaks(mut self, provider: Arc<dyn StreakProvider>) -> Self {
        self.streaks = Some(provider);
        self
    }

    #[must_use]
    pub fn with_time(mut self, provider: Arc<dyn TimeProvider>) -> Self {
        self.time = Some(provider);
        self
    }

    #[must_use]
    pub fn with_quits(mut self, provider: Arc<dyn QuitProvider>) -> Self {
        self.quits = Some(provider);
        self
    }

    #[must_use]
    pub fn with_level_progress(mut self, provider: Arc<dyn LevelProgressProvider>) -> Self {
        self.level_progress = Some(provider);
        self
    }

    #[must_use]
    pub fn with_session_history(mut self, provider: Arc<dyn SessionHistoryProvider>) -> Self {
        self.session_history = Some(provider);
        self
    }
}
