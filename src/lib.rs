//! Geo-referenced AR session core.
//!
//! `GeoSessionController` drives one geo-tracking session against an
//! [`ArRuntime`]: it checks availability, waits for localization, buffers
//! anchor requests made too early and places them in order once the device
//! is localized. Hosts observe progress through [`SessionEvent`]s.

pub mod coords;
pub mod error;
pub mod frame;
pub mod overlay;
pub mod points;
pub mod runtime;
pub mod session;
pub mod settings;

#[cfg(feature = "cli")]
pub mod cli;

pub use coords::{GeodeticCoordinate, LocalPose};
pub use error::{GeoSessionError, Result};
pub use frame::LocalFrame;
pub use overlay::{OverlayCoordinator, OverlayState};
pub use runtime::{ArRuntime, CoachingUi, GeoAvailability, RuntimeError, SimulatedRuntime};
pub use session::{
    Anchor, AnchorFailure, GeoSessionController, RequestId, SessionConfig, SessionEvent,
    SessionState, SessionStatus,
};
