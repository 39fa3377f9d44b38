//! FIFO buffer for anchor requests submitted before the session is ready.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coords::GeodeticCoordinate;

/// Per-session anchor request identifier, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRequest {
    pub id: RequestId,
    pub coordinate: GeodeticCoordinate,
    /// Logical submission counter
    pub submitted_at: u64,
}

#[derive(Debug)]
pub struct AnchorRequestQueue {
    pending: VecDeque<AnchorRequest>,
    next_id: u64,
}

impl AnchorRequestQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Allocate the next id without buffering (used once the session is localized)
    pub fn issue(&mut self, coordinate: GeodeticCoordinate) -> AnchorRequest {
        let id = self.next_id;
        self.next_id += 1;
        AnchorRequest {
            id: RequestId(id),
            coordinate,
            submitted_at: id,
        }
    }

    pub fn enqueue(&mut self, coordinate: GeodeticCoordinate) -> RequestId {
        let request = self.issue(coordinate);
        let id = request.id;
        self.pending.push_back(request);
        id
    }

    pub fn drain_in_order(&mut self) -> Vec<AnchorRequest> {
        self.pending.drain(..).collect()
    }

    /// Remove every pending request, oldest first, for failure reporting
    pub fn discard_all(&mut self) -> Vec<AnchorRequest> {
        self.pending.drain(..).collect()
    }

    /// Put requests that were handed out but never issued back in front.
    ///
    /// `requests` must be older than everything still pending; they keep
    /// their original ids.
    pub fn restore_front(&mut self, requests: impl IntoIterator<Item = AnchorRequest>) {
        let restored: Vec<AnchorRequest> = requests.into_iter().collect();
        debug_assert!(restored.windows(2).all(|w| w[0].id < w[1].id));
        debug_assert!(match (restored.last(), self.pending.front()) {
            (Some(last), Some(first)) => last.id < first.id,
            _ => true,
        });
        for request in restored.into_iter().rev() {
            self.pending.push_front(request);
        }
    }

    /// Forget pending requests and restart ids at 1
    pub fn reset(&mut self) {
        self.pending.clear();
        self.next_id = 1;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for AnchorRequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> GeodeticCoordinate {
        GeodeticCoordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut queue = AnchorRequestQueue::new();
        assert_eq!(queue.enqueue(coord(1.0, 1.0)), RequestId(1));
        assert_eq!(queue.enqueue(coord(2.0, 2.0)), RequestId(2));
        assert_eq!(queue.issue(coord(3.0, 3.0)).id, RequestId(3));
        assert_eq!(queue.enqueue(coord(4.0, 4.0)), RequestId(4));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_drain_preserves_order_and_duplicates() {
        let mut queue = AnchorRequestQueue::new();
        let same = coord(37.7, -122.4);
        queue.enqueue(same);
        queue.enqueue(coord(40.7, -74.0));
        queue.enqueue(same);

        let drained = queue.drain_in_order();
        let ids: Vec<u64> = drained.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(drained[0].coordinate, drained[2].coordinate);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_restore_front_keeps_submission_order() {
        let mut queue = AnchorRequestQueue::new();
        queue.enqueue(coord(1.0, 0.0));
        queue.enqueue(coord(2.0, 0.0));
        let handed_out = queue.drain_in_order();
        queue.enqueue(coord(3.0, 0.0));

        queue.restore_front(handed_out);
        let ids: Vec<RequestId> = queue.drain_in_order().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RequestId(1), RequestId(2), RequestId(3)]);
    }

    #[test]
    fn test_reset_restarts_ids() {
        let mut queue = AnchorRequestQueue::new();
        queue.enqueue(coord(1.0, 0.0));
        queue.enqueue(coord(2.0, 0.0));
        let discarded = queue.discard_all();
        assert_eq!(discarded.len(), 2);

        queue.reset();
        assert_eq!(queue.enqueue(coord(3.0, 0.0)), RequestId(1));
    }
}
