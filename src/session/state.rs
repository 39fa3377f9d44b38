//! Session lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a session attempt ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    UnsupportedDevice,
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    CheckingAvailability,
    Localizing,
    Localized,
    Failed(FailureCode),
    Stopped,
}

impl SessionState {
    /// `start_session` is honored from these states
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Stopped | SessionState::Failed(_)
        )
    }

    /// Anchor requests are buffered in these states
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::CheckingAvailability | SessionState::Localizing
        )
    }

    /// A session attempt is in progress (not idle, failed or stopped)
    pub fn is_active(&self) -> bool {
        self.is_pending() || *self == SessionState::Localized
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::CheckingAvailability => "checking_availability",
            SessionState::Localizing => "localizing",
            SessionState::Localized => "localized",
            SessionState::Failed(_) => "failed",
            SessionState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed(code) => write!(f, "failed ({:?})", code),
            other => f.write_str(other.name()),
        }
    }
}
