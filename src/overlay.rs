//! Coaching overlay toggle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::runtime::{CoachingUi, RuntimeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayState {
    #[default]
    Hidden,
    Shown,
}

/// Forwards show/hide requests to the UI, suppressing repeats.
pub struct OverlayCoordinator {
    ui: Arc<dyn CoachingUi>,
    state: OverlayState,
}

impl OverlayCoordinator {
    pub fn new(ui: Arc<dyn CoachingUi>) -> Self {
        Self {
            ui,
            state: OverlayState::Hidden,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// Show the overlay. Returns `Ok(true)` only when the UI was actually called.
    ///
    /// On a UI failure the overlay stays `Hidden`, so a later call retries.
    pub fn enable(&mut self) -> Result<bool, RuntimeError> {
        if self.state == OverlayState::Shown {
            tracing::trace!("[overlay] Already shown");
            return Ok(false);
        }
        self.ui.show_coaching_overlay()?;
        self.state = OverlayState::Shown;
        tracing::debug!("[overlay] Shown");
        Ok(true)
    }

    /// Hide the overlay if shown. The state is reset even if the UI call fails.
    pub fn hide(&mut self) -> Result<bool, RuntimeError> {
        if self.state == OverlayState::Hidden {
            return Ok(false);
        }
        self.state = OverlayState::Hidden;
        self.ui.hide_coaching_overlay()?;
        tracing::debug!("[overlay] Hidden");
        Ok(true)
    }
}
