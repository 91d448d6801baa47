//! Behavioral signals for difficulty adjustment.
//!
//! A signal is one independent heuristic that reads player behavior through
//! [providers](crate::provider) and produces a single signed difficulty delta
//! (positive = harder). Each signal produces a [`SignalResult`] carrying the
//! delta, a human-readable reason, and diagnostic metadata.
//!
//! # Available Signals
//!
//! **Performance Signals** - Respond to wins and losses:
//! - [`WinStreakSignal`] - Raises difficulty during a win streak
//! - [`LossStreakSignal`] - Lowers difficulty during a loss streak
//! - [`CompletionRateSignal`] - Compares the overall win rate with low/high bands
//!
//! **Engagement Signals** - Respond to how the player plays and leaves:
//! - [`TimeDecaySignal`] - Eases the player back in after time away
//! - [`RageQuitSignal`] - Reacts to how the last session ended
//! - [`SessionPatternSignal`] - Multi-factor analysis of session durations and quits
//!
//! **Progression Signals** - Respond to level-level metrics:
//! - [`LevelProgressSignal`] - Attempts, completion time, progression speed, mastery
//!
//! # Evaluation Contract
//!
//! [`Signal::evaluate()`] reads providers and configuration only; it never mutates
//! them and never sees another signal's output. A failure is returned as a
//! [`SignalError`] and converted to a zero-value result by the
//! [calculator](crate::calculator), which then continues with the remaining signals.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    config::EngineConfig,
    provider::{ProviderError, Providers},
};

pub use self::{
    completion_rate::CompletionRateSignal, level_progress::LevelProgressSignal,
    loss_streak::LossStreakSignal, rage_quit::RageQuitSignal,
    session_pattern::SessionPatternSignal, time_decay::TimeDecaySignal,
    win_streak::WinStreakSignal,
};

mod completion_rate;
mod level_progress;
mod loss_streak;
mod rage_quit;
mod session_pattern;
mod time_decay;
mod win_streak;

/// Identifies one of the built-in signals.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum SignalId {
    #[display("win_streak")]
    WinStreak,
    #[display("loss_streak")]
    LossStreak,
    #[display("time_decay")]
    TimeDecay,
    #[display("rage_quit")]
    RageQuit,
    #[display("completion_rate")]
    CompletionRate,
    #[display("level_progress")]
    LevelProgress,
    #[display("session_pattern")]
    SessionPattern,
}

impl SignalId {
    pub const ALL: [Self; 7] = [
        Self::WinStreak,
        Self::LossStreak,
        Self::TimeDecay,
        Self::RageQuit,
        Self::CompletionRate,
        Self::LevelProgress,
        Self::SessionPattern,
    ];
}

/// Diagnostic value attached to a [`SignalResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(untagged)]
pub enum MetaValue {
    Flag(bool),
    Integer(i64),
    Number(f32),
    Text(String),
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<u32> for MetaValue {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<usize> for MetaValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f32> for MetaValue {
    fn from(value: f32) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Output of a single signal evaluation.
///
/// `value` is the signed difficulty delta (positive = harder). A result with
/// `value == 0.0` has no effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub name: SignalId,
    pub value: f32,
    pub reason: String,
    /// Evaluation priority of the producing signal (lower runs first).
    pub priority: u32,
    pub metadata: BTreeMap<String, MetaValue>,
}

impl SignalResult {
    #[must_use]
    pub fn new(name: SignalId, priority: u32, value: f32, reason: impl Into<String>) -> Self {
        Self {
            name,
            value,
            reason: reason.into(),
            priority,
            metadata: BTreeMap::new(),
        }
    }

    /// Creates a result that leaves difficulty unchanged.
    #[must_use]
    pub fn no_change(name: SignalId, priority: u32, reason: impl Into<String>) -> Self {
        Self::new(name, priority, 0.0, reason)
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn is_no_change(&self) -> bool {
        self.value == 0.0
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SignalError {
    #[display("provider query failed: {_0}")]
    Provider(ProviderError),
    #[display("computed {what} is not finite")]
    NonFinite { what: &'static str },
}

impl From<ProviderError> for SignalError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

/// Per-call inputs shared by all signals in one calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationContext {
    /// Current difficulty, already clamped into the configured range.
    pub current_difficulty: f32,
}

/// A behavioral heuristic producing one difficulty delta.
pub trait Signal: fmt::Debug + Send + Sync {
    #[must_use]
    fn id(&self) -> SignalId;

    /// Evaluation order and tie-break rank (lower runs first).
    #[must_use]
    fn priority(&self) -> u32;

    #[must_use]
    fn is_enabled(&self) -> bool;

    /// Computes the signal's delta from the current provider snapshot.
    fn evaluate(&self, ctx: &EvaluationContext) -> Result<SignalResult, SignalError>;
}

pub type BoxedSignal = Box<dyn Signal>;

impl Signal for BoxedSignal {
    fn id(&self) -> SignalId {
        self.as_ref().id()
    }

    fn priority(&self) -> u32 {
        self.as_ref().priority()
    }

    fn is_enabled(&self) -> bool {
        self.as_ref().is_enabled()
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
        self.as_ref().evaluate(ctx)
    }
}

/// Builds every enabled signal whose required providers are present.
///
/// Signals missing a required provider or disabled in `config` are left out
/// entirely; neither is an error.
#[must_use]
pub fn build_signals(config: &EngineConfig, providers: &Providers) -> Vec<BoxedSignal> {
    let mut signals: Vec<BoxedSignal> = vec![];

    if let Some(streaks) = &providers.streaks {
        signals.push(Box::new(WinStreakSignal::new(
            config.win_streak.clone(),
            streaks.clone(),
        )));
        signals.push(Box::new(LossStreakSignal::new(
            config.loss_streak.clone(),
            streaks.clone(),
        )));
        signals.push(Box::new(CompletionRateSignal::new(
            config.completion_rate.clone(),
            streaks.clone(),
            providers.level_progress.clone(),
        )));
    }
    if let Some(time) = &providers.time {
        signals.push(Box::new(TimeDecaySignal::new(
            config.time_decay.clone(),
            time.clone(),
        )));
    }
    if let Some(quits) = &providers.quits {
        signals.push(Box::new(RageQuitSignal::new(
            config.rage_quit.clone(),
            quits.clone(),
        )));
        signals.push(Box::new(SessionPatternSignal::new(
            config.session_pattern.clone(),
            quits.clone(),
            providers.session_history.clone(),
            providers.streaks.clone(),
        )));
    }
    if let Some(level_progress) = &providers.level_progress {
        signals.push(Box::new(LevelProgressSignal::new(
            config.level_progress.clone(),
            level_progress.clone(),
        )));
    }

    signals.retain(|s| s.is_enabled());
    signals
}

/// Rejects NaN and infinite deltas before they reach aggregation.
pub(crate) fn ensure_finite(value: f32, what: &'static str) -> Result<f32, SignalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SignalError::NonFinite { what })
    }
}
