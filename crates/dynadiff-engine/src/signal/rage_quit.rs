use std::sync::Arc;

use crate::{
    config::{RageQuitConfig, non_negative},
    provider::{QuitProvider, QuitType},
    signal::{EvaluationContext, Signal, SignalError, SignalId, SignalResult},
};

/// Lowers difficulty according to how the last session ended.
///
/// | Last quit  | Value                    |
/// |------------|--------------------------|
/// | `RageQuit` | `-rage_quit_penalty`     |
/// | `Normal`   | `-normal_quit_penalty`   |
/// | `MidPlay`  | `-mid_play_quit_penalty` |
/// | unknown    | `0`                      |
#[derive(Debug, Clone)]
pub struct RageQuitSignal {
    config: RageQuitConfig,
    quits: Arc<dyn QuitProvider>,
}

impl RageQuitSignal {
    #[must_use]
    pub fn new(config: RageQuitConfig, quits: Arc<dyn QuitProvider>) -> Self {
        Self { config, quits }
    }
}

impl Signal for RageQuitSignal {
    fn id(&self) -> SignalId {
        SignalId::RageQuit
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn evaluate(&self, _ctx: &EvaluationContext) -> Result<SignalResult, SignalError> {
        let Some(quit_type) = self.quits.last_quit_type()? else {
            return Ok(SignalResult::no_change(
                self.id(),
                self.priority(),
                "No quit recorded",
            ));
        };

        let (penalty, reason) = match quit_type {
            QuitType::RageQuit => (self.config.rage_quit_penalty, "Rage quit detected"),
            QuitType::Normal => (self.config.normal_quit_penalty, "Normal quit"),
            QuitType::MidPlay => (self.config.mid_play_quit_penalty, "Quit mid-level"),
        };
        let penalty = non_negative(penalty);
        let value = if penalty > 0.0 { -penalty } else { 0.0 };

        Ok(SignalResult::new(self.id(), self.priority(), value, reason)
            .with_meta("quit_type", format!("{quit_type:?}")))
    }
}
