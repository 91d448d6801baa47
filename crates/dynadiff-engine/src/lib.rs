//! Stateless dynamic difficulty adjustment for games.
//!
//! This crate turns observed player behavior into one bounded difficulty change per
//! session. The pipeline has three levels:
//!
//! 1. **Signals** ([`signal`]) - Seven independent heuristics (win streak, loss streak,
//!    time decay, rage quit, completion rate, level progress, session pattern), each
//!    producing one signed delta with a reason.
//!
//! 2. **Aggregation** ([`aggregation`]) - Combines the deltas of all firing signals into
//!    a raw delta (sum, weighted average, diminishing returns, or max absolute).
//!
//! 3. **Calculation** ([`calculator`]) - Runs the enabled signals in priority order,
//!    isolates failures, aggregates, and clamps the result to the difficulty range and
//!    the per-session change limit.
//!
//! # Architecture
//!
//! ```text
//! DifficultyCalculator
//!     ↓ evaluates
//! Signal × 7  ──reads──▶  Providers (host-implemented, read-only)
//!     ↓ SignalResult list
//! AggregationStrategy
//!     ↓ raw delta
//! clamp to range, clamp to ±max_change_per_session
//!     ↓
//! DifficultyResult
//! ```
//!
//! # Supporting Modules
//!
//! - [`provider`] - Narrow traits through which signals read player data
//! - [`config`] - Tunable parameters with defaults and sanitization
//! - [`snapshot`] - Serializable in-memory providers for tests, tools, and simple hosts
//!
//! # Design Principles
//!
//! ## Stateless
//!
//! The engine stores no player data. Each calculation reads providers, returns a
//! [`DifficultyResult`](calculator::DifficultyResult), and forgets everything; the host
//! persists the new difficulty.
//!
//! ## Graceful Degradation
//!
//! A failing signal becomes a zero-value result and an entry in `error_messages`. A
//! calculation always returns an in-range difficulty.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use dynadiff_engine::{
//!     calculator::DifficultyCalculator,
//!     config::EngineConfig,
//!     provider::Providers,
//!     snapshot::StreakSnapshot,
//! };
//!
//! let streaks = StreakSnapshot {
//!     loss_streak: 4,
//!     total_losses: 4,
//!     ..StreakSnapshot::default()
//! };
//! let providers = Providers::new().with_streaks(Arc::new(streaks));
//! let calculator = DifficultyCalculator::new(EngineConfig::default(), &providers);
//!
//! let result = calculator.calculate_difficulty(5.0);
//! assert!(result.new_difficulty < 5.0);
//! assert_eq!(result.primary_reason, "Loss streak of 4");
//! ```

pub mod aggregation;
pub mod calculator;
pub mod config;
pub mod provider;
pub mod signal;
pub mod snapshot;
