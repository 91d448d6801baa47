//! Combining signal deltas into one difficulty change.
//!
//! Several signals usually fire at once (e.g. a win streak while the player also
//! quits sessions early). [`AggregationStrategy`] decides how their values combine:
//!
//! | Strategy                | Result                                                        |
//! |-------------------------|---------------------------------------------------------------|
//! | `SimpleSum`             | `Σ vᵢ`                                                        |
//! | `WeightedAverage`       | `Σ(vᵢ·wᵢ) / Σwᵢ` with `wᵢ = 1 / (1 + priorityᵢ)`              |
//! | `DiminishingReturns(f)` | `Σ vᵢ·fⁱ` over values sorted by descending `\|vᵢ\|`           |
//! | `MaxAbsolute`           | the `vᵢ` with the largest `\|vᵢ\|`                            |
//!
//! # Diminishing Returns
//!
//! The default strategy. The strongest signal counts fully and each weaker one is
//! discounted geometrically, so many small signals cannot stack up to override one
//! strong signal:
//!
//! ```
//! use dynadiff_engine::{
//!     aggregation::AggregationStrategy,
//!     signal::{SignalId, SignalResult},
//! };
//!
//! let signals = [
//!     SignalResult::new(SignalId::WinStreak, 0, 1.5, "win streak"),
//!     SignalResult::new(SignalId::RageQuit, 3, -1.0, "rage quit"),
//!     SignalResult::new(SignalId::SessionPattern, 6, -0.5, "short sessions"),
//! ];
//!
//! // 1.5 × 1 + (-1.0) × 0.6 + (-0.5) × 0.36
//! let delta = AggregationStrategy::DiminishingReturns { factor: 0.6 }.aggregate(&signals);
//! assert!((delta - 0.72).abs() < 1e-6);
//!
//! let delta = AggregationStrategy::SimpleSum.aggregate(&signals);
//! assert!(delta.abs() < 1e-6);
//! ```
//!
//! Ties in magnitude keep evaluation order (the sort is stable), so the result is
//! deterministic for a given input.

use serde::{Deserialize, Serialize};

use crate::signal::SignalResult;

pub const DEFAULT_DIMINISHING_FACTOR: f32 = 0.6;

const MIN_DIMINISHING_FACTOR: f32 = 0.01;
const MAX_DIMINISHING_FACTOR: f32 = 0.99;

fn default_factor() -> f32 {
    DEFAULT_DIMINISHING_FACTOR
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationStrategy {
    #[display("simple sum")]
    SimpleSum,
    #[display("weighted average")]
    WeightedAverage,
    #[display("diminishing returns (factor {factor})")]
    DiminishingReturns {
        /// Decay rate in `(0, 1)` applied per rank.
        #[serde(default = "default_factor")]
        factor: f32,
    },
    #[display("max absolute")]
    MaxAbsolute,
}

impl Default for AggregationStrategy {
    fn default() -> Self {
        Self::DiminishingReturns {
            factor: DEFAULT_DIMINISHING_FACTOR,
        }
    }
}

impl AggregationStrategy {
    /// Returns a copy whose diminishing factor lies strictly inside `(0, 1)`.
    #[must_use]
    pub fn sanitized(self) -> Self {
        match self {
            Self::DiminishingReturns { factor } => Self::DiminishingReturns {
                factor: if factor.is_finite() {
                    factor.clamp(MIN_DIMINISHING_FACTOR, MAX_DIMINISHING_FACTOR)
                } else {
                    DEFAULT_DIMINISHING_FACTOR
                },
            },
            other => other,
        }
    }

    /// Combines signal values into a single delta. Returns `0.0` for no signals.
    #[must_use]
    pub fn aggregate(&self, signals: &[SignalResult]) -> f32 {
        match self {
            Self::SimpleSum => signals.iter().map(|s| s.value).sum(),
            Self::WeightedAverage => weighted_average(signals),
            Self::DiminishingReturns { factor } => diminishing_returns(signals, *factor),
            Self::MaxAbsolute => max_absolute(signals),
        }
    }
}

/// Weight derived from a signal's priority; higher priority (lower number) weighs more.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn priority_weight(priority: u32) -> f32 {
    1.0 / (1.0 + priority as f32)
}

fn weighted_average(signals: &[SignalResult]) -> f32 {
    let (weighted_sum, total_weight) = signals.iter().fold((0.0, 0.0), |(sum, total), s| {
        let w = priority_weight(s.priority);
        (sum + s.value * w, total + w)
    });
    if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    }
}

fn diminishing_returns(signals: &[SignalResult], factor: f32) -> f32 {
    let mut values = signals.iter().map(|s| s.value).collect::<Vec<_>>();
    // `sort_by` is stable: equal magnitudes keep evaluation order
    values.sort_by(|a, b| b.abs().total_cmp(&a.abs()));

    let mut scale = 1.0;
    let mut total = 0.0;
    for value in values {
        total += value * scale;
        scale *= factor;
    }
    total
}

fn max_absolute(signals: &[SignalResult]) -> f32 {
    let mut best: Option<f32> = None;
    for s in signals {
        if best.is_none_or(|b| s.value.abs() > b.abs()) {
            best = Some(s.value);
        }
    }
    best.unwrap_or(0.0)
}
