//! End-to-end tests for the geo session core against the simulated runtime.
//!
//! These tests cover:
//! - Ordered dispatch of queued anchor requests
//! - Failure reporting for unsupported/unauthorized devices
//! - Tracking loss and re-localization
//! - Cancellation on stop and on runtime disconnection
//! - Coaching overlay forwarding

#![cfg(test)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio::sync::mpsc;

use super::config::SessionConfig;
use super::controller::GeoSessionController;
use super::events::{AnchorFailure, SessionEvent};
use super::queue::RequestId;
use super::state::{FailureCode, SessionState};
use crate::coords::GeodeticCoordinate;
use crate::error::GeoSessionError;
use crate::frame::LocalFrame;
use crate::overlay::OverlayState;
use crate::runtime::{GeoAvailability, RuntimeError, SimulatedRuntime};

const WAIT: Duration = Duration::from_secs(5);

fn simulated() -> SimulatedRuntime {
    SimulatedRuntime::new(LocalFrame::new(
        GeodeticCoordinate::new(37.7749, -122.4194).unwrap(),
    ))
}

fn setup(
    runtime: SimulatedRuntime,
    config: SessionConfig,
) -> (
    Arc<SimulatedRuntime>,
    GeoSessionController,
    mpsc::UnboundedReceiver<SessionEvent>,
) {
    let runtime = Arc::new(runtime);
    let (controller, rx) = GeoSessionController::new(runtime.clone(), runtime.clone(), config);
    (runtime, controller, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}

/// Consume events up to and including the transition into `target`
async fn wait_for_state(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    target: SessionState,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(rx).await;
        let reached = matches!(
            &event,
            SessionEvent::SessionStateChanged { current, .. } if *current == target
        );
        seen.push(event);
        if reached {
            return seen;
        }
    }
}

/// Consume events until `count` anchor requests have settled; returns those
async fn collect_settled(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    count: usize,
) -> Vec<SessionEvent> {
    let mut settled = Vec::new();
    while settled.len() < count {
        let event = next_event(rx).await;
        if event.settled_request().is_some() {
            settled.push(event);
        }
    }
    settled
}

fn drain_now(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn settled_ids(events: &[SessionEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| e.settled_request())
        .map(|id| id.0)
        .collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_queued_anchors_created_in_submission_order() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());

    controller.start_session().unwrap();
    let sf = controller.add_geo_anchor(37.7, -122.4).unwrap();
    let nyc = controller.add_geo_anchor(40.7, -74.0).unwrap();
    assert_eq!((sf, nyc), (RequestId(1), RequestId(2)));
    assert_eq!(controller.status().queued, 2);

    wait_for_state(&mut rx, SessionState::Localizing).await;
    assert_eq!(runtime.anchor_call_count(), 0);
    assert!(runtime.signal_localized());

    let settled = collect_settled(&mut rx, 2).await;
    match (&settled[0], &settled[1]) {
        (
            SessionEvent::AnchorCreated {
                request_id: first,
                anchor: first_anchor,
            },
            SessionEvent::AnchorCreated {
                request_id: second,
                anchor: second_anchor,
            },
        ) => {
            assert_eq!(*first, sf);
            assert_eq!(*second, nyc);
            assert_eq!(first_anchor.coordinate.latitude(), 37.7);
            assert_eq!(second_anchor.coordinate.latitude(), 40.7);
        }
        other => panic!("expected two AnchorCreated events, got {:?}", other),
    }

    assert_eq!(controller.state(), SessionState::Localized);
    assert_eq!(controller.anchors().len(), 2);
    assert_eq!(runtime.anchor_call_count(), 2);
    assert_eq!(controller.status().queued, 0);
}

#[tokio::test]
async fn test_drain_continues_past_failures() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());
    runtime.reject_anchor_call(2, RuntimeError::AnchorRejected("low confidence".to_string()));
    runtime.reject_anchor_call(5, RuntimeError::AnchorRejected("occluded".to_string()));

    controller.start_session().unwrap();
    for i in 0..6 {
        controller.add_geo_anchor(37.0 + i as f64 * 0.001, -122.0).unwrap();
    }

    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();

    let settled = collect_settled(&mut rx, 6).await;
    assert_eq!(settled_ids(&settled), vec![1, 2, 3, 4, 5, 6]);

    let failed: Vec<u64> = settled
        .iter()
        .filter_map(|e| match e {
            SessionEvent::AnchorCreationFailed { request_id, reason } => {
                assert!(matches!(reason, AnchorFailure::Rejected { .. }));
                Some(request_id.0)
            }
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec![2, 5]);

    let anchor_ids: Vec<u64> = controller.anchors().iter().map(|a| a.id.0).collect();
    assert_eq!(anchor_ids, vec![1, 3, 4, 6]);
}

#[tokio::test]
async fn test_anchor_after_localized_bypasses_queue() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());

    controller.start_session().unwrap();
    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();
    wait_for_state(&mut rx, SessionState::Localized).await;

    let id = controller.add_geo_anchor(37.7750, -122.4194).unwrap();
    assert_eq!(id, RequestId(1));
    assert_eq!(controller.status().queued, 0);

    let settled = collect_settled(&mut rx, 1).await;
    match &settled[0] {
        SessionEvent::AnchorCreated { request_id, anchor } => {
            assert_eq!(*request_id, id);
            // About 11 m north of the frame origin
            assert!((anchor.local_pose.position[2] - 11.13).abs() < 0.05);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(controller.anchor(id).is_some());
}

#[tokio::test]
async fn test_identical_coordinates_are_distinct_requests() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());

    controller.start_session().unwrap();
    controller.add_geo_anchor(40.7, -74.0).unwrap();
    controller.add_geo_anchor(40.7, -74.0).unwrap();
    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();

    let settled = collect_settled(&mut rx, 2).await;
    assert_eq!(settled_ids(&settled), vec![1, 2]);
    assert_eq!(runtime.anchor_call_count(), 2);
    assert_eq!(controller.anchors().len(), 2);
}

#[tokio::test]
async fn test_late_rejection_after_localized_fails_only_that_anchor() {
    let runtime = simulated().with_anchor_latency(Duration::from_millis(5));
    let (runtime, controller, mut rx) = setup(runtime, SessionConfig::default());
    runtime.reject_anchor_call(1, RuntimeError::AnchorRejected("plane lost".to_string()));

    controller.start_session().unwrap();
    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();
    wait_for_state(&mut rx, SessionState::Localized).await;

    let first = controller.add_geo_anchor(37.7750, -122.4194).unwrap();
    let second = controller.add_geo_anchor(37.7751, -122.4194).unwrap();
    // The rejection only arrives after the anchor latency
    assert!(drain_now(&mut rx)
        .iter()
        .all(|e| e.settled_request().is_none()));

    let settled = collect_settled(&mut rx, 2).await;
    match (&settled[0], &settled[1]) {
        (
            SessionEvent::AnchorCreationFailed {
                request_id: failed,
                reason: AnchorFailure::Rejected { message },
            },
            SessionEvent::AnchorCreated {
                request_id: created,
                ..
            },
        ) => {
            assert_eq!(*failed, first);
            assert!(message.contains("plane lost"));
            assert_eq!(*created, second);
        }
        other => panic!("unexpected settlement {:?}", other),
    }

    assert_eq!(controller.state(), SessionState::Localized);
    assert!(controller.anchor(first).is_none());
    assert!(controller.anchor(second).is_some());
    assert_eq!(runtime.anchor_call_count(), 2);
}

#[tokio::test]
async fn test_out_of_range_target_fails_transform() {
    let runtime = simulated().with_max_range_m(1_000.0);
    let (runtime, controller, mut rx) = setup(runtime, SessionConfig::default());

    controller.start_session().unwrap();
    controller.add_geo_anchor(37.7750, -122.4194).unwrap();
    controller.add_geo_anchor(40.7, -74.0).unwrap();
    controller.add_geo_anchor(37.7760, -122.4190).unwrap();
    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();

    let settled = collect_settled(&mut rx, 3).await;
    assert_eq!(settled_ids(&settled), vec![1, 2, 3]);
    match &settled[1] {
        SessionEvent::AnchorCreationFailed {
            request_id,
            reason: AnchorFailure::TransformFailed { message },
        } => {
            assert_eq!(*request_id, RequestId(2));
            assert!(message.contains("limit 1000m"));
        }
        other => panic!("unexpected event {:?}", other),
    }

    // The far target never reaches the engine
    assert_eq!(runtime.anchor_call_count(), 2);
    let anchor_ids: Vec<u64> = controller.anchors().iter().map(|a| a.id.0).collect();
    assert_eq!(anchor_ids, vec![1, 3]);
    assert_eq!(controller.state(), SessionState::Localized);
}

// ============================================================================
// Availability failures
// ============================================================================

#[tokio::test]
async fn test_unauthorized_reports_each_queued_request() {
    let runtime = simulated().with_availability(GeoAvailability::Unauthorized);
    let (runtime, controller, mut rx) = setup(runtime, SessionConfig::default());

    controller.start_session().unwrap();
    controller.add_geo_anchor(37.7, -122.4).unwrap();
    controller.add_geo_anchor(40.7, -74.0).unwrap();

    wait_for_state(&mut rx, SessionState::Failed(FailureCode::Unauthorized)).await;
    let settled = collect_settled(&mut rx, 2).await;
    for (event, expected) in settled.iter().zip([1u64, 2]) {
        match event {
            SessionEvent::AnchorCreationFailed { request_id, reason } => {
                assert_eq!(request_id.0, expected);
                assert_eq!(*reason, AnchorFailure::Unauthorized);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    assert_eq!(
        controller.state(),
        SessionState::Failed(FailureCode::Unauthorized)
    );
    assert_eq!(runtime.subscription_count(), 0);
    assert_eq!(runtime.anchor_call_count(), 0);
    assert!(matches!(
        controller.add_geo_anchor(1.0, 1.0),
        Err(GeoSessionError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_unsupported_device_fails_session() {
    let runtime = simulated().with_availability(GeoAvailability::Unsupported);
    let (_runtime, controller, mut rx) = setup(runtime, SessionConfig::default());

    controller.start_session().unwrap();
    controller.add_geo_anchor(51.5, -0.12).unwrap();

    let events =
        wait_for_state(&mut rx, SessionState::Failed(FailureCode::UnsupportedDevice)).await;
    let states: Vec<SessionState> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::SessionStateChanged { current, .. } => Some(*current),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            SessionState::Starting,
            SessionState::CheckingAvailability,
            SessionState::Failed(FailureCode::UnsupportedDevice),
        ]
    );

    let settled = collect_settled(&mut rx, 1).await;
    assert!(matches!(
        &settled[0],
        SessionEvent::AnchorCreationFailed {
            reason: AnchorFailure::UnsupportedDevice,
            ..
        }
    ));
}

#[tokio::test]
async fn test_retry_after_failure_starts_fresh_session() {
    let runtime = simulated().with_availability(GeoAvailability::Unauthorized);
    let (runtime, controller, mut rx) = setup(runtime, SessionConfig::default());

    controller.start_session().unwrap();
    let failed_session = controller.session_id();
    controller.add_geo_anchor(10.0, 10.0).unwrap();
    wait_for_state(&mut rx, SessionState::Failed(FailureCode::Unauthorized)).await;
    collect_settled(&mut rx, 1).await;

    runtime.set_availability(GeoAvailability::Available);
    controller.start_session().unwrap();
    assert_ne!(controller.session_id(), failed_session);
    assert_eq!(controller.add_geo_anchor(10.0, 10.0).unwrap(), RequestId(1));

    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();
    let settled = collect_settled(&mut rx, 1).await;
    assert!(matches!(&settled[0], SessionEvent::AnchorCreated { .. }));
}

#[tokio::test]
async fn test_probe_error_stops_session() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());
    runtime.fail_probe(RuntimeError::Disconnected);

    controller.start_session().unwrap();
    controller.add_geo_anchor(48.85, 2.35).unwrap();

    wait_for_state(&mut rx, SessionState::Stopped).await;
    let settled = collect_settled(&mut rx, 1).await;
    assert!(matches!(
        &settled[0],
        SessionEvent::AnchorCreationFailed {
            reason: AnchorFailure::RuntimeDisconnected,
            ..
        }
    ));
}

#[tokio::test]
async fn test_probe_timeout_stops_session() {
    let runtime = simulated().with_probe_latency(Duration::from_secs(30));
    let config = SessionConfig::default().with_probe_timeout_secs(1);
    let (_runtime, controller, mut rx) = setup(runtime, config);

    controller.start_session().unwrap();
    wait_for_state(&mut rx, SessionState::Stopped).await;
    assert_eq!(controller.state(), SessionState::Stopped);
}

// ============================================================================
// Tracking loss
// ============================================================================

#[tokio::test]
async fn test_tracking_lost_requeues_until_relocalized() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());

    controller.start_session().unwrap();
    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();
    wait_for_state(&mut rx, SessionState::Localized).await;

    controller.add_geo_anchor(37.7, -122.4).unwrap();
    collect_settled(&mut rx, 1).await;

    runtime.signal_tracking_lost();
    wait_for_state(&mut rx, SessionState::Localizing).await;

    let queued = controller.add_geo_anchor(37.71, -122.41).unwrap();
    assert_eq!(queued, RequestId(2));
    assert!(matches!(
        next_event(&mut rx).await,
        SessionEvent::AnchorQueued { request_id, .. } if request_id == queued
    ));
    assert_eq!(controller.status().queued, 1);
    assert_eq!(runtime.anchor_call_count(), 1);
    // Anchors placed before the loss are retained
    assert_eq!(controller.anchors().len(), 1);

    runtime.signal_localized();
    let settled = collect_settled(&mut rx, 1).await;
    assert_eq!(settled_ids(&settled), vec![2]);
    assert_eq!(controller.anchors().len(), 2);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_anchor_calls_after_stop() {
    for delay_ms in [0u64, 1, 3, 7, 15] {
        let runtime = simulated().with_anchor_latency(Duration::from_millis(2));
        let (runtime, controller, mut rx) = setup(runtime, SessionConfig::default());

        controller.start_session().unwrap();
        for i in 0..10 {
            controller.add_geo_anchor(37.7 + i as f64 * 0.0001, -122.4).unwrap();
        }
        wait_for_state(&mut rx, SessionState::Localizing).await;
        runtime.signal_localized();

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        controller.stop_session();
        let calls_at_stop = runtime.anchor_call_count();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(
            runtime.anchor_call_count(),
            calls_at_stop,
            "anchor call issued after stop (delay {}ms)",
            delay_ms
        );

        let events = drain_now(&mut rx);
        let stopped_at = events
            .iter()
            .position(|e| {
                matches!(
                    e,
                    SessionEvent::SessionStateChanged {
                        current: SessionState::Stopped,
                        ..
                    }
                )
            })
            .expect("missing Stopped transition");
        assert!(
            !events[stopped_at..]
                .iter()
                .any(|e| matches!(e, SessionEvent::AnchorCreated { .. })),
            "anchor created after stop (delay {}ms)",
            delay_ms
        );

        // Every request settled exactly once, in order
        let ids = settled_ids(&events);
        assert_eq!(ids, (1..=10).collect::<Vec<u64>>());
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 10);
        assert!(controller.anchors().is_empty());
    }
}

#[tokio::test]
async fn test_stop_discards_queue_and_resets_ids() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());

    controller.start_session().unwrap();
    controller.add_geo_anchor(1.0, 1.0).unwrap();
    controller.add_geo_anchor(2.0, 2.0).unwrap();
    controller.stop_session();

    let events = drain_now(&mut rx);
    let discarded: Vec<(u64, AnchorFailure)> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::AnchorCreationFailed { request_id, reason } => {
                Some((request_id.0, reason.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        discarded,
        vec![
            (1, AnchorFailure::SessionStopped),
            (2, AnchorFailure::SessionStopped)
        ]
    );
    assert_eq!(controller.state(), SessionState::Stopped);
    assert!(!runtime.is_subscribed());

    // The probe never completes for the retired session
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(controller.state(), SessionState::Stopped);
    assert_eq!(runtime.subscription_count(), 0);

    controller.start_session().unwrap();
    assert_eq!(controller.add_geo_anchor(3.0, 3.0).unwrap(), RequestId(1));
}

#[tokio::test]
async fn test_disconnect_signal_stops_session() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());

    controller.start_session().unwrap();
    wait_for_state(&mut rx, SessionState::Localizing).await;
    controller.add_geo_anchor(35.68, 139.69).unwrap();

    runtime.signal_disconnected();
    wait_for_state(&mut rx, SessionState::Stopped).await;
    let settled = collect_settled(&mut rx, 1).await;
    assert!(matches!(
        &settled[0],
        SessionEvent::AnchorCreationFailed {
            reason: AnchorFailure::RuntimeDisconnected,
            ..
        }
    ));
    assert_eq!(runtime.anchor_call_count(), 0);
}

#[tokio::test]
async fn test_anchor_disconnect_error_stops_session() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());
    runtime.reject_anchor_call(1, RuntimeError::Disconnected);

    controller.start_session().unwrap();
    controller.add_geo_anchor(1.0, 1.0).unwrap();
    controller.add_geo_anchor(2.0, 2.0).unwrap();
    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();

    let settled = collect_settled(&mut rx, 2).await;
    assert_eq!(settled_ids(&settled), vec![1, 2]);
    assert!(settled.iter().all(|e| matches!(
        e,
        SessionEvent::AnchorCreationFailed {
            reason: AnchorFailure::RuntimeDisconnected,
            ..
        }
    )));
    assert_eq!(controller.state(), SessionState::Stopped);
    assert_eq!(runtime.anchor_call_count(), 1);
}

// ============================================================================
// Coaching overlay
// ============================================================================

#[tokio::test]
async fn test_enable_overlay_twice_shows_once() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());

    controller.start_session().unwrap();
    controller.enable_coaching_overlay().unwrap();
    controller.enable_coaching_overlay().unwrap();
    assert_eq!(runtime.show_calls(), 1);
    assert_eq!(controller.status().overlay, OverlayState::Shown);

    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();
    wait_for_state(&mut rx, SessionState::Localized).await;
    assert_eq!(runtime.hide_calls(), 1);

    // Accepted, but nothing to show once localized
    controller.enable_coaching_overlay().unwrap();
    assert_eq!(runtime.show_calls(), 1);
}

#[tokio::test]
async fn test_overlay_kept_when_configured() {
    let config = SessionConfig::default().keep_overlay_when_localized();
    let (runtime, controller, mut rx) = setup(simulated(), config);

    controller.start_session().unwrap();
    controller.enable_coaching_overlay().unwrap();
    wait_for_state(&mut rx, SessionState::Localizing).await;
    runtime.signal_localized();
    wait_for_state(&mut rx, SessionState::Localized).await;

    assert_eq!(runtime.hide_calls(), 0);
    assert_eq!(controller.status().overlay, OverlayState::Shown);

    // Still hidden when the session ends
    controller.stop_session();
    assert_eq!(runtime.hide_calls(), 1);
    assert_eq!(controller.status().overlay, OverlayState::Hidden);
}

#[tokio::test]
async fn test_overlay_ui_called_before_entry_point_returns() {
    let (runtime, controller, _rx) = setup(simulated(), SessionConfig::default());

    controller.start_session().unwrap();
    controller.enable_coaching_overlay().unwrap();
    assert_eq!(runtime.show_calls(), 1);

    controller.stop_session();
    assert_eq!(runtime.hide_calls(), 1);
}

#[tokio::test]
async fn test_auto_coaching_on_start() {
    let config = SessionConfig::default().with_auto_coaching();
    let (runtime, controller, _rx) = setup(simulated(), config);

    controller.start_session().unwrap();
    assert_eq!(runtime.show_calls(), 1);

    controller.stop_session();
    assert_eq!(runtime.hide_calls(), 1);
    assert_eq!(controller.status().overlay, OverlayState::Hidden);
}

#[tokio::test]
async fn test_overlay_failure_is_reported_not_fatal() {
    let (runtime, controller, mut rx) = setup(simulated(), SessionConfig::default());
    runtime.fail_overlay(RuntimeError::Overlay("no root view".to_string()));

    controller.start_session().unwrap();
    controller.enable_coaching_overlay().unwrap();

    let events = wait_for_state(&mut rx, SessionState::Localizing).await;
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::OverlayFailed { .. })));
    assert_eq!(controller.state(), SessionState::Localizing);
}

// ============================================================================
// Coordinate validation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: in-range coordinates are always accepted and queued
    #[test]
    fn prop_in_range_coordinates_accepted(
        lat in -90.0f64..=90.0,
        lon in -180.0f64..=180.0
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let queued = rt.block_on(async {
            let runtime = simulated().with_probe_latency(Duration::from_secs(60));
            let (_runtime, controller, _rx) = setup(runtime, SessionConfig::default());
            controller.start_session().unwrap();
            let result = controller.add_geo_anchor(lat, lon);
            (result.is_ok(), controller.status().queued)
        });
        prop_assert!(queued.0);
        prop_assert_eq!(queued.1, 1);
    }

    /// Property: out-of-range coordinates always fail and never enqueue
    #[test]
    fn prop_out_of_range_coordinates_rejected(
        lat in prop_oneof![-1000.0f64..-90.000001, 90.000001f64..1000.0],
        lon in -180.0f64..=180.0,
        swap in any::<bool>()
    ) {
        // Either latitude is bad, or (swapped) longitude is
        let (lat, lon) = if swap { (lon / 2.0, lat * 2.0) } else { (lat, lon) };
        let rt = tokio::runtime::Runtime::new().unwrap();
        let outcome = rt.block_on(async {
            let runtime = simulated().with_probe_latency(Duration::from_secs(60));
            let (_runtime, controller, _rx) = setup(runtime, SessionConfig::default());
            controller.start_session().unwrap();
            let result = controller.add_geo_anchor(lat, lon);
            (
                matches!(result, Err(GeoSessionError::InvalidCoordinate(_))),
                controller.status().queued,
            )
        });
        prop_assert!(outcome.0);
        prop_assert_eq!(outcome.1, 0);
    }
}
