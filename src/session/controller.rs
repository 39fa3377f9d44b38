//! Geo session state machine.
//!
//! All state lives in one `Core` behind a `parking_lot::Mutex`. Two tokio
//! tasks run per session attempt:
//! - the driver, which awaits the availability probe and then consumes
//!   localization signals in order;
//! - the dispatch worker, the single consumer that issues anchor-add calls
//!   one at a time while the session is localized.
//!
//! Every session attempt gets a new epoch. Tasks check their epoch under the
//! lock before touching state, so work belonging to a retired session can
//! never mutate the current one or report a success.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::config::SessionConfig;
use super::events::{Anchor, AnchorFailure, SessionEvent};
use super::queue::{AnchorRequest, AnchorRequestQueue, RequestId};
use super::state::{FailureCode, SessionState};
use crate::coords::{GeodeticCoordinate, LocalPose};
use crate::error::{GeoSessionError, Result};
use crate::overlay::{OverlayCoordinator, OverlayState};
use crate::runtime::{
    AnchorHandle, ArRuntime, CoachingUi, GeoAvailability, LocalizationSignal, RuntimeError,
};

/// Snapshot of the controller for hosts and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub state: SessionState,
    /// Requests buffered until localization
    pub queued: usize,
    /// Requests handed to the dispatch worker, including the one in flight
    pub dispatching: usize,
    pub anchors: usize,
    pub overlay: OverlayState,
}

/// Owner of one geo-tracking session at a time.
///
/// Methods never block on the runtime; they must be called from within a
/// tokio runtime because `start_session` spawns the session tasks. Share it
/// across threads as `Arc<GeoSessionController>`.
pub struct GeoSessionController {
    inner: Arc<Inner>,
}

struct Inner {
    runtime: Arc<dyn ArRuntime>,
    config: SessionConfig,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    core: Mutex<Core>,
    /// Wakes the dispatch worker
    wake: Notify,
}

struct Core {
    session_id: Uuid,
    epoch: u64,
    state: SessionState,
    queue: AnchorRequestQueue,
    dispatch: VecDeque<AnchorRequest>,
    in_flight: Option<AnchorRequest>,
    anchors: BTreeMap<RequestId, Anchor>,
    overlay: OverlayCoordinator,
    tasks: Vec<JoinHandle<()>>,
}

impl GeoSessionController {
    /// Create an idle controller and the receiver for its events.
    pub fn new(
        runtime: Arc<dyn ArRuntime>,
        ui: Arc<dyn CoachingUi>,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let core = Core {
            session_id: Uuid::new_v4(),
            epoch: 0,
            state: SessionState::Idle,
            queue: AnchorRequestQueue::new(),
            dispatch: VecDeque::new(),
            in_flight: None,
            anchors: BTreeMap::new(),
            overlay: OverlayCoordinator::new(ui),
            tasks: Vec::new(),
        };
        let inner = Arc::new(Inner {
            runtime,
            config,
            event_tx,
            core: Mutex::new(core),
            wake: Notify::new(),
        });
        (Self { inner }, event_rx)
    }

    /// Begin a session attempt.
    ///
    /// Valid from `Idle`, `Stopped` and `Failed`; each start is a fresh
    /// session with request ids restarting at 1. The availability probe runs
    /// in the background.
    ///
    /// # Errors
    /// `GeoSessionError::InvalidState` if a session attempt is already active.
    /// Nothing changes in that case.
    pub fn start_session(&self) -> Result<()> {
        let inner = &self.inner;
        let mut core = inner.core.lock();

        if !core.state.can_start() {
            tracing::warn!(
                "[geo-session] start_session ignored: session {} is {}",
                core.session_id,
                core.state
            );
            return Err(GeoSessionError::InvalidState {
                operation: "start session",
                state: core.state,
            });
        }

        core.epoch += 1;
        core.session_id = Uuid::new_v4();
        core.queue.reset();
        core.dispatch.clear();
        core.in_flight = None;
        core.anchors.clear();

        tracing::info!("[geo-session] Starting session {}", core.session_id);
        inner.transition(&mut core, SessionState::Starting);
        inner.transition(&mut core, SessionState::CheckingAvailability);

        if inner.config.auto_enable_coaching {
            inner.show_overlay(&mut core);
        }

        let driver = tokio::spawn(Inner::drive_session(inner.clone(), core.epoch));
        core.tasks.push(driver);
        Ok(())
    }

    /// Retire the current session from any state.
    ///
    /// Pending and in-flight requests are reported as
    /// `AnchorFailure::SessionStopped`; created anchors are forgotten. No
    /// anchor-add call is issued to the runtime after this returns.
    pub fn stop_session(&self) {
        let inner = &self.inner;
        let mut core = inner.core.lock();
        tracing::info!(
            "[geo-session] Stopping session {} ({})",
            core.session_id,
            core.state
        );
        inner.retire(&mut core, SessionState::Stopped, AnchorFailure::SessionStopped);
    }

    /// Request a geo-anchor at `latitude`/`longitude`.
    ///
    /// Returns immediately with the request id; the outcome arrives later as
    /// `AnchorCreated` or `AnchorCreationFailed` on the event channel.
    ///
    /// # Errors
    /// - `InvalidCoordinate` when the coordinate is out of range (never queued)
    /// - `InvalidState` when no session attempt is active
    pub fn add_geo_anchor(&self, latitude: f64, longitude: f64) -> Result<RequestId> {
        let coordinate = GeodeticCoordinate::new(latitude, longitude).map_err(|e| {
            tracing::debug!("[geo-session] Rejected anchor request: {}", e);
            e
        })?;
        self.add_geo_anchor_at(coordinate)
    }

    /// Same as `add_geo_anchor`, for an already validated coordinate.
    pub fn add_geo_anchor_at(&self, coordinate: GeodeticCoordinate) -> Result<RequestId> {
        let inner = &self.inner;
        let mut core = inner.core.lock();

        match core.state {
            state if state.is_pending() => {
                let request_id = core.queue.enqueue(coordinate);
                tracing::debug!(
                    "[geo-session] Queued anchor {} at {} ({} pending)",
                    request_id,
                    coordinate,
                    core.queue.len()
                );
                inner.emit(SessionEvent::AnchorQueued {
                    request_id,
                    coordinate,
                });
                Ok(request_id)
            }
            SessionState::Localized => {
                let request = core.queue.issue(coordinate);
                let request_id = request.id;
                tracing::debug!(
                    "[geo-session] Dispatching anchor {} at {}",
                    request_id,
                    coordinate
                );
                core.dispatch.push_back(request);
                inner.wake.notify_one();
                Ok(request_id)
            }
            state => Err(GeoSessionError::InvalidState {
                operation: "add geo anchor",
                state,
            }),
        }
    }

    /// Show the coaching overlay while the session is localizing.
    ///
    /// Accepted without effect once localized. UI failures are reported as
    /// `SessionEvent::OverlayFailed`, not as an error.
    ///
    /// # Errors
    /// `InvalidState` when no session attempt is active.
    pub fn enable_coaching_overlay(&self) -> Result<()> {
        let inner = &self.inner;
        let mut core = inner.core.lock();

        match core.state {
            state if state.is_pending() => {
                inner.show_overlay(&mut core);
                Ok(())
            }
            SessionState::Localized => {
                tracing::debug!("[overlay] Coaching request ignored, session already localized");
                Ok(())
            }
            state => Err(GeoSessionError::InvalidState {
                operation: "enable coaching overlay",
                state,
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.inner.core.lock().state
    }

    /// Id of the current (or most recent) session
    pub fn session_id(&self) -> Uuid {
        self.inner.core.lock().session_id
    }

    /// Snapshot of state, queue depth, anchors and overlay.
    pub fn status(&self) -> SessionStatus {
        let core = self.inner.core.lock();
        SessionStatus {
            session_id: core.session_id,
            state: core.state,
            queued: core.queue.len(),
            dispatching: core.dispatch.len() + usize::from(core.in_flight.is_some()),
            anchors: core.anchors.len(),
            overlay: core.overlay.state(),
        }
    }

    /// Anchors created in the current session, in request order
    pub fn anchors(&self) -> Vec<Anchor> {
        self.inner.core.lock().anchors.values().cloned().collect()
    }

    /// The anchor created for `id`, if it has been placed.
    pub fn anchor(&self, id: RequestId) -> Option<Anchor> {
        self.inner.core.lock().anchors.get(&id).cloned()
    }
}

impl Drop for GeoSessionController {
    fn drop(&mut self) {
        let mut core = self.inner.core.lock();
        core.epoch += 1;
        for task in core.tasks.drain(..) {
            task.abort();
        }
        if core.state.is_active() {
            self.inner.runtime.unsubscribe_localization();
        }
    }
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("[geo-session] Event receiver dropped");
        }
    }

    fn transition(&self, core: &mut Core, next: SessionState) {
        let previous = core.state;
        if previous == next {
            return;
        }
        core.state = next;
        tracing::info!(
            "[geo-session] {} -> {} (session {})",
            previous,
            next,
            core.session_id
        );
        self.emit(SessionEvent::SessionStateChanged {
            session_id: core.session_id,
            previous,
            current: next,
        });
    }

    fn show_overlay(&self, core: &mut Core) {
        if let Err(e) = core.overlay.enable() {
            tracing::warn!("[overlay] Failed to show coaching overlay: {}", e);
            self.emit(SessionEvent::OverlayFailed {
                message: e.to_string(),
            });
        }
    }

    fn hide_overlay(&self, core: &mut Core) {
        if let Err(e) = core.overlay.hide() {
            tracing::warn!("[overlay] Failed to hide coaching overlay: {}", e);
            self.emit(SessionEvent::OverlayFailed {
                message: e.to_string(),
            });
        }
    }

    /// End the current attempt: cancel tasks, report every unsettled request
    /// with `reason`, forget anchors, move to `next`.
    fn retire(&self, core: &mut Core, next: SessionState, reason: AnchorFailure) {
        let was_active = core.state.is_active();
        core.epoch += 1;
        for task in core.tasks.drain(..) {
            task.abort();
        }
        if was_active {
            self.runtime.unsubscribe_localization();
        }

        self.transition(core, next);

        let mut discarded: Vec<AnchorRequest> = core.in_flight.take().into_iter().collect();
        discarded.extend(core.dispatch.drain(..));
        discarded.extend(core.queue.discard_all());
        if !discarded.is_empty() {
            tracing::info!(
                "[geo-session] Discarding {} unsettled anchor requests ({})",
                discarded.len(),
                reason.name()
            );
        }
        for request in discarded {
            self.emit(SessionEvent::AnchorCreationFailed {
                request_id: request.id,
                reason: reason.clone(),
            });
        }

        core.anchors.clear();
        core.queue.reset();
        self.hide_overlay(core);
    }

    async fn drive_session(self: Arc<Self>, epoch: u64) {
        let probe = self.runtime.probe_geo_availability();
        let verdict = match self.config.probe_timeout() {
            Some(limit) => match tokio::time::timeout(limit, probe).await {
                Ok(result) => result,
                Err(_) => Err(RuntimeError::Other(format!(
                    "availability probe timed out after {}s",
                    limit.as_secs()
                ))),
            },
            None => probe.await,
        };

        let mut signals = match verdict {
            Ok(GeoAvailability::Available) => match self.begin_localizing(epoch) {
                Some(rx) => rx,
                None => return,
            },
            Ok(GeoAvailability::Unsupported) => {
                self.fail(epoch, FailureCode::UnsupportedDevice);
                return;
            }
            Ok(GeoAvailability::Unauthorized) => {
                self.fail(epoch, FailureCode::Unauthorized);
                return;
            }
            Err(e) => {
                self.disconnect(epoch, &e);
                return;
            }
        };

        while let Some(signal) = signals.recv().await {
            if !self.handle_signal(epoch, signal) {
                return;
            }
        }

        self.disconnect(epoch, &RuntimeError::Disconnected);
    }

    fn begin_localizing(
        self: &Arc<Self>,
        epoch: u64,
    ) -> Option<mpsc::UnboundedReceiver<LocalizationSignal>> {
        let mut core = self.core.lock();
        if core.epoch != epoch {
            return None;
        }

        match self.runtime.subscribe_localization() {
            Ok(rx) => {
                self.transition(&mut core, SessionState::Localizing);
                let worker = tokio::spawn(Inner::run_dispatch(self.clone(), epoch));
                core.tasks.push(worker);
                Some(rx)
            }
            Err(e) => {
                tracing::error!("[geo-session] Localization subscription failed: {}", e);
                self.retire(
                    &mut core,
                    SessionState::Stopped,
                    AnchorFailure::RuntimeDisconnected,
                );
                None
            }
        }
    }

    fn fail(&self, epoch: u64, code: FailureCode) {
        let mut core = self.core.lock();
        if core.epoch != epoch {
            return;
        }
        tracing::warn!(
            "[geo-session] Geo tracking unavailable for session {}: {:?}",
            core.session_id,
            code
        );
        self.retire(&mut core, SessionState::Failed(code), code.into());
    }

    fn disconnect(&self, epoch: u64, error: &RuntimeError) {
        let mut core = self.core.lock();
        if core.epoch != epoch {
            return;
        }
        tracing::error!(
            "[geo-session] Runtime lost for session {}: {}",
            core.session_id,
            error
        );
        self.retire(
            &mut core,
            SessionState::Stopped,
            AnchorFailure::RuntimeDisconnected,
        );
    }

    /// Apply one localization signal. Returns false once the session is over.
    fn handle_signal(&self, epoch: u64, signal: LocalizationSignal) -> bool {
        let mut core = self.core.lock();
        if core.epoch != epoch {
            return false;
        }

        match (signal, core.state) {
            (LocalizationSignal::Localized, SessionState::Localizing) => {
                self.transition(&mut core, SessionState::Localized);
                let drained = core.queue.drain_in_order();
                if !drained.is_empty() {
                    tracing::info!(
                        "[geo-session] Localized, dispatching {} queued anchors",
                        drained.len()
                    );
                }
                core.dispatch.extend(drained);
                if self.config.hide_overlay_when_localized {
                    self.hide_overlay(&mut core);
                }
                self.wake.notify_one();
            }
            (LocalizationSignal::TrackingLost, SessionState::Localized) => {
                self.transition(&mut core, SessionState::Localizing);
                // Not yet issued; they go back ahead of anything queued later
                let unsent: Vec<AnchorRequest> = core.dispatch.drain(..).collect();
                if !unsent.is_empty() {
                    tracing::debug!(
                        "[geo-session] Tracking lost, re-queueing {} anchors",
                        unsent.len()
                    );
                }
                core.queue.restore_front(unsent);
            }
            (LocalizationSignal::Disconnected, _) => {
                drop(core);
                self.disconnect(epoch, &RuntimeError::Disconnected);
                return false;
            }
            (signal, state) => {
                tracing::debug!("[geo-session] Ignoring {:?} while {}", signal, state);
            }
        }
        true
    }

    async fn run_dispatch(self: Arc<Self>, epoch: u64) {
        loop {
            // Submission happens under the lock so stop_session can never
            // race a call into the runtime.
            let issued = {
                let mut core = self.core.lock();
                if core.epoch != epoch {
                    return;
                }
                if core.state != SessionState::Localized {
                    None
                } else if let Some(request) = core.dispatch.pop_front() {
                    let submission = self
                        .runtime
                        .to_local_pose(&request.coordinate)
                        .map(|pose| (pose, self.runtime.add_anchor(pose)));
                    core.in_flight = Some(request.clone());
                    Some((request, submission))
                } else {
                    None
                }
            };

            match issued {
                Some((request, submission)) => {
                    let outcome = match submission {
                        Ok((pose, pending)) => pending
                            .await
                            .map(|handle| (pose, handle))
                            .map_err(|e| match e {
                                RuntimeError::Disconnected => AnchorFailure::RuntimeDisconnected,
                                e => AnchorFailure::Rejected {
                                    message: e.to_string(),
                                },
                            }),
                        Err(RuntimeError::Disconnected) => Err(AnchorFailure::RuntimeDisconnected),
                        Err(e) => Err(AnchorFailure::TransformFailed {
                            message: e.to_string(),
                        }),
                    };
                    self.settle(epoch, request, outcome);
                }
                None => self.wake.notified().await,
            }
        }
    }

    fn settle(
        &self,
        epoch: u64,
        request: AnchorRequest,
        outcome: std::result::Result<(LocalPose, AnchorHandle), AnchorFailure>,
    ) {
        let mut core = self.core.lock();
        if core.epoch != epoch {
            // Already reported when the session was retired
            tracing::debug!(
                "[geo-session] Dropping late runtime result for anchor {}",
                request.id
            );
            return;
        }
        core.in_flight = None;

        let request_id = request.id;
        match outcome {
            Ok((pose, handle)) => {
                let anchor = Anchor::from_request(request, pose, handle);
                tracing::debug!(
                    "[geo-session] Anchor {} placed at {:?}",
                    request_id,
                    pose.position
                );
                core.anchors.insert(request_id, anchor.clone());
                self.emit(SessionEvent::AnchorCreated { request_id, anchor });
            }
            Err(AnchorFailure::RuntimeDisconnected) => {
                self.emit(SessionEvent::AnchorCreationFailed {
                    request_id,
                    reason: AnchorFailure::RuntimeDisconnected,
                });
                tracing::error!(
                    "[geo-session] Runtime disconnected while placing anchor {}",
                    request_id
                );
                self.retire(
                    &mut core,
                    SessionState::Stopped,
                    AnchorFailure::RuntimeDisconnected,
                );
            }
            Err(reason) => {
                tracing::warn!("[geo-session] Anchor {} failed: {:?}", request_id, reason);
                self.emit(SessionEvent::AnchorCreationFailed { request_id, reason });
            }
        }
    }
}
