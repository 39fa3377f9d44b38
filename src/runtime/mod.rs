// Runtime abstraction for the AR engine and the coaching UI.
//
// The session core never talks to a concrete AR framework. Hosts implement
// `ArRuntime` and `CoachingUi` over whatever engine they bind to; the crate
// ships `SimulatedRuntime` for the CLI and tests.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::coords::{GeodeticCoordinate, LocalPose};

pub mod simulated;

pub use simulated::SimulatedRuntime;

/// Runtime-specific errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("AR runtime disconnected")]
    Disconnected,

    #[error("Anchor rejected: {0}")]
    AnchorRejected(String),

    #[error("Coordinate transform failed: {0}")]
    Transform(String),

    #[error("Coaching overlay unavailable: {0}")]
    Overlay(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Verdict of the one-shot geo-tracking capability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoAvailability {
    Available,
    Unsupported,
    Unauthorized,
}

/// Localization progress delivered by the runtime after subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalizationSignal {
    Localized,
    TrackingLost,
    Disconnected,
}

/// Opaque runtime identifier of a placed anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorHandle(pub u64);

/// Completion of a submitted anchor
pub type PendingAnchor = BoxFuture<'static, Result<AnchorHandle, RuntimeError>>;

/// AR engine surface consumed by the geo session.
///
/// # Object Safety
/// This trait is object-safe and intended to be used as `Arc<dyn ArRuntime>`.
///
/// # Threading
/// Methods may be called from any tokio worker thread. The synchronous
/// methods are called while the session lock is held and must not call back
/// into the controller.
#[async_trait]
pub trait ArRuntime: Send + Sync + 'static {
    /// Query whether geo-tracking is supported and authorized on this device.
    ///
    /// Called once per session start.
    ///
    /// # Errors
    /// Any error is treated as the runtime being unreachable.
    async fn probe_geo_availability(&self) -> Result<GeoAvailability, RuntimeError>;

    /// Subscribe to localization progress.
    ///
    /// Signals must be delivered in the order the runtime observed them.
    /// Closing the channel is treated as `LocalizationSignal::Disconnected`.
    fn subscribe_localization(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<LocalizationSignal>, RuntimeError>;

    /// Drop the current localization subscription, if any.
    fn unsubscribe_localization(&self);

    /// Geodetic-to-local transform for the current session frame.
    fn to_local_pose(&self, coordinate: &GeodeticCoordinate) -> Result<LocalPose, RuntimeError>;

    /// Submit an anchor at `pose`.
    ///
    /// The anchor is handed to the engine before this returns; the returned
    /// future resolves once placement succeeded or failed, possibly much
    /// later. A failure only affects this anchor unless it is
    /// `RuntimeError::Disconnected`.
    fn add_anchor(&self, pose: LocalPose) -> PendingAnchor;
}

/// Coaching overlay surface owned by the host UI.
///
/// # Threading
/// Both methods are called while the session lock is held. Implementations
/// must return promptly and must not call back into the controller.
pub trait CoachingUi: Send + Sync + 'static {
    fn show_coaching_overlay(&self) -> Result<(), RuntimeError>;

    fn hide_coaching_overlay(&self) -> Result<(), RuntimeError>;
}
