//! Events delivered to the host over the session event channel.
//!
//! Every anchor request ends in exactly one `AnchorCreated` or
//! `AnchorCreationFailed` event, including requests discarded because the
//! session failed or stopped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::queue::{AnchorRequest, RequestId};
use super::state::{FailureCode, SessionState};
use crate::coords::{GeodeticCoordinate, LocalPose};
use crate::runtime::AnchorHandle;

/// A geo-anchor placed in the session's local frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Same id as the originating request
    pub id: RequestId,
    pub coordinate: GeodeticCoordinate,
    pub local_pose: LocalPose,
    pub handle: AnchorHandle,
    pub created_at: DateTime<Utc>,
}

impl Anchor {
    pub fn from_request(request: AnchorRequest, local_pose: LocalPose, handle: AnchorHandle) -> Self {
        Self {
            id: request.id,
            coordinate: request.coordinate,
            local_pose,
            handle,
            created_at: Utc::now(),
        }
    }
}

/// Why an anchor request did not produce an anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorFailure {
    /// Geo-tracking is not supported on this device
    UnsupportedDevice,
    /// Geo-tracking (location or camera) permission was denied
    Unauthorized,
    /// The AR runtime went away before the anchor was placed
    RuntimeDisconnected,
    /// `stop_session` retired the session first
    SessionStopped,
    /// The runtime could not map the coordinate into the local frame
    TransformFailed { message: String },
    /// The runtime refused or failed to place the anchor
    Rejected { message: String },
}

impl AnchorFailure {
    pub fn name(&self) -> &'static str {
        match self {
            AnchorFailure::UnsupportedDevice => "unsupported_device",
            AnchorFailure::Unauthorized => "unauthorized",
            AnchorFailure::RuntimeDisconnected => "runtime_disconnected",
            AnchorFailure::SessionStopped => "session_stopped",
            AnchorFailure::TransformFailed { .. } => "transform_failed",
            AnchorFailure::Rejected { .. } => "rejected",
        }
    }
}

impl From<FailureCode> for AnchorFailure {
    fn from(code: FailureCode) -> Self {
        match code {
            FailureCode::UnsupportedDevice => AnchorFailure::UnsupportedDevice,
            FailureCode::Unauthorized => AnchorFailure::Unauthorized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStateChanged {
        session_id: Uuid,
        previous: SessionState,
        current: SessionState,
    },

    /// Request accepted while the session was not yet localized
    AnchorQueued {
        request_id: RequestId,
        coordinate: GeodeticCoordinate,
    },

    AnchorCreated {
        request_id: RequestId,
        anchor: Anchor,
    },

    AnchorCreationFailed {
        request_id: RequestId,
        reason: AnchorFailure,
    },

    /// The UI collaborator failed to show or hide the coaching overlay
    OverlayFailed { message: String },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStateChanged { .. } => "session_state_changed",
            SessionEvent::AnchorQueued { .. } => "anchor_queued",
            SessionEvent::AnchorCreated { .. } => "anchor_created",
            SessionEvent::AnchorCreationFailed { .. } => "anchor_creation_failed",
            SessionEvent::OverlayFailed { .. } => "overlay_failed",
        }
    }

    /// Request this event settles, if it is a terminal anchor outcome
    pub fn settled_request(&self) -> Option<RequestId> {
        match self {
            SessionEvent::AnchorCreated { request_id, .. }
            | SessionEvent::AnchorCreationFailed { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}
