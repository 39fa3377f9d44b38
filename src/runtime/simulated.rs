use super::{
    AnchorHandle, ArRuntime, CoachingUi, GeoAvailability, LocalizationSignal, PendingAnchor,
    RuntimeError,
};
use crate::coords::{GeodeticCoordinate, LocalPose};
use crate::frame::LocalFrame;
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// In-process AR runtime with scripted behavior.
///
/// Localization never happens on its own: call `signal_localized()` (or the
/// other `signal_*` methods) once the session has subscribed. Every
/// `add_anchor` call is recorded before its latency elapses, so callers can
/// observe exactly which poses reached the runtime. Outcomes (handle or
/// rejection) are decided at submission and delivered after the latency.
///
/// With a maximum range set, coordinates farther than that from the frame
/// origin cannot be transformed, like an engine whose tracked map has a
/// limited extent.
pub struct SimulatedRuntime {
    frame: LocalFrame,
    max_range_m: Option<f64>,
    availability: RwLock<GeoAvailability>,
    probe_error: RwLock<Option<RuntimeError>>,
    probe_latency: Duration,
    anchor_latency: Duration,
    signal_tx: Mutex<Option<mpsc::UnboundedSender<LocalizationSignal>>>,
    subscriptions: AtomicUsize,
    anchor_calls: Mutex<Vec<LocalPose>>,
    /// 1-based call number -> error returned for that call
    rejections: Mutex<HashMap<usize, RuntimeError>>,
    next_handle: AtomicU64,
    overlay_error: RwLock<Option<RuntimeError>>,
    show_calls: AtomicUsize,
    hide_calls: AtomicUsize,
}

impl SimulatedRuntime {
    pub fn new(frame: LocalFrame) -> Self {
        Self {
            frame,
            max_range_m: None,
            availability: RwLock::new(GeoAvailability::Available),
            probe_error: RwLock::new(None),
            probe_latency: Duration::ZERO,
            anchor_latency: Duration::ZERO,
            signal_tx: Mutex::new(None),
            subscriptions: AtomicUsize::new(0),
            anchor_calls: Mutex::new(Vec::new()),
            rejections: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            overlay_error: RwLock::new(None),
            show_calls: AtomicUsize::new(0),
            hide_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_availability(self, availability: GeoAvailability) -> Self {
        *self.availability.write() = availability;
        self
    }

    pub fn with_probe_latency(mut self, latency: Duration) -> Self {
        self.probe_latency = latency;
        self
    }

    pub fn with_anchor_latency(mut self, latency: Duration) -> Self {
        self.anchor_latency = latency;
        self
    }

    /// Refuse to transform coordinates more than `meters` (horizontally)
    /// from the origin. Non-positive values mean unlimited.
    pub fn with_max_range_m(mut self, meters: f64) -> Self {
        self.max_range_m = (meters > 0.0).then_some(meters);
        self
    }

    pub fn origin(&self) -> GeodeticCoordinate {
        self.frame.origin()
    }

    /// Make the next probes fail as if the runtime were unreachable
    pub fn fail_probe(&self, error: RuntimeError) {
        *self.probe_error.write() = Some(error);
    }

    pub fn set_availability(&self, availability: GeoAvailability) {
        *self.availability.write() = availability;
    }

    /// Fail the `call_number`-th `add_anchor` call (1-based) with `error`
    pub fn reject_anchor_call(&self, call_number: usize, error: RuntimeError) {
        self.rejections.lock().insert(call_number, error);
    }

    pub fn fail_overlay(&self, error: RuntimeError) {
        *self.overlay_error.write() = Some(error);
    }

    pub fn signal_localized(&self) -> bool {
        self.signal(LocalizationSignal::Localized)
    }

    pub fn signal_tracking_lost(&self) -> bool {
        self.signal(LocalizationSignal::TrackingLost)
    }

    pub fn signal_disconnected(&self) -> bool {
        self.signal(LocalizationSignal::Disconnected)
    }

    /// Send a signal to the current subscriber.
    ///
    /// Returns false when nobody is subscribed.
    pub fn signal(&self, signal: LocalizationSignal) -> bool {
        let guard = self.signal_tx.lock();
        match guard.as_ref() {
            Some(tx) => {
                tracing::debug!("[sim-runtime] Signal {:?}", signal);
                tx.send(signal).is_ok()
            }
            None => {
                tracing::debug!("[sim-runtime] Dropping {:?}, no subscriber", signal);
                false
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.signal_tx.lock().is_some()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn anchor_call_count(&self) -> usize {
        self.anchor_calls.lock().len()
    }

    pub fn show_calls(&self) -> usize {
        self.show_calls.load(Ordering::SeqCst)
    }

    pub fn hide_calls(&self) -> usize {
        self.hide_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArRuntime for SimulatedRuntime {
    async fn probe_geo_availability(&self) -> Result<GeoAvailability, RuntimeError> {
        if !self.probe_latency.is_zero() {
            tokio::time::sleep(self.probe_latency).await;
        }
        if let Some(err) = self.probe_error.read().clone() {
            return Err(err);
        }
        let availability = *self.availability.read();
        tracing::debug!("[sim-runtime] Probe resolved: {:?}", availability);
        Ok(availability)
    }

    fn subscribe_localization(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<LocalizationSignal>, RuntimeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.signal_tx.lock() = Some(tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    fn unsubscribe_localization(&self) {
        self.signal_tx.lock().take();
    }

    fn to_local_pose(&self, coordinate: &GeodeticCoordinate) -> Result<LocalPose, RuntimeError> {
        let pose = self.frame.to_local(coordinate);
        if let Some(max_range) = self.max_range_m {
            let distance = pose.position[0].hypot(pose.position[2]);
            if distance > max_range {
                return Err(RuntimeError::Transform(format!(
                    "{} is {:.0}m from the origin (limit {:.0}m)",
                    coordinate, distance, max_range
                )));
            }
        }
        Ok(pose)
    }

    fn add_anchor(&self, pose: LocalPose) -> PendingAnchor {
        let call_number = {
            let mut calls = self.anchor_calls.lock();
            calls.push(pose);
            calls.len()
        };

        let outcome = match self.rejections.lock().remove(&call_number) {
            Some(err) => {
                tracing::debug!("[sim-runtime] Rejecting anchor call {}: {}", call_number, err);
                Err(err)
            }
            None => Ok(AnchorHandle(self.next_handle.fetch_add(1, Ordering::SeqCst))),
        };

        let latency = self.anchor_latency;
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            outcome
        }
        .boxed()
    }
}

impl CoachingUi for SimulatedRuntime {
    fn show_coaching_overlay(&self) -> Result<(), RuntimeError> {
        if let Some(err) = self.overlay_error.read().clone() {
            return Err(err);
        }
        self.show_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn hide_coaching_overlay(&self) -> Result<(), RuntimeError> {
        self.hide_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
