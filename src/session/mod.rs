//! Geo-tracking session core.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle -> Starting -> CheckingAvailability -> Localizing <-> Localized
//!                              |                  |             |
//!                              v                  v             v
//!                      Failed(reason)          Stopped  <-  stop_session / disconnect
//! ```
//!
//! Anchor requests made before the session is localized wait in the
//! `AnchorRequestQueue` and are dispatched in submission order once the
//! runtime reports localization. Requests made while localized skip the
//! queue. Every request is settled by exactly one event.

pub mod config;
pub mod controller;
pub mod events;
pub mod queue;
pub mod state;

#[cfg(test)]
mod integration_tests;

pub use config::SessionConfig;
pub use controller::{GeoSessionController, SessionStatus};
pub use events::{Anchor, AnchorFailure, SessionEvent};
pub use queue::{AnchorRequest, AnchorRequestQueue, RequestId};
pub use state::{FailureCode, SessionState};
