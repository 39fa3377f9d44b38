//! Configuration for the geo session controller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Show the coaching overlay as part of `start_session`
    pub auto_enable_coaching: bool,

    /// Hide the coaching overlay once the session is localized
    pub hide_overlay_when_localized: bool,

    /// Seconds to wait for the availability probe (0 = wait forever).
    /// A timeout is handled like a disconnected runtime.
    pub probe_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_enable_coaching: false,
            hide_overlay_when_localized: true,
            probe_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_coaching(mut self) -> Self {
        self.auto_enable_coaching = true;
        self
    }

    pub fn with_probe_timeout_secs(mut self, secs: u64) -> Self {
        self.probe_timeout_secs = secs;
        self
    }

    /// Keep the overlay visible after localization
    pub fn keep_overlay_when_localized(mut self) -> Self {
        self.hide_overlay_when_localized = false;
        self
    }

    pub fn probe_timeout(&self) -> Option<Duration> {
        (self.probe_timeout_secs > 0).then(|| Duration::from_secs(self.probe_timeout_secs))
    }
}
