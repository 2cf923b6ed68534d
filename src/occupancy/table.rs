//! In-memory table of open presence intervals.

use std::collections::{BTreeMap, BTreeSet};

use crate::occupancy::interval::{ClosedInterval, PresenceInterval, Timestamp};
use crate::occupancy::track_id::TrackId;

/// Open presence intervals keyed by track id.
///
/// `observe` is the only way intervals are opened or closed, which keeps
/// at most one open interval per track id. Closed intervals leave the
/// table immediately; persisting them is the caller's job.
#[derive(Debug, Default)]
pub struct OccupancyTable {
    open: BTreeMap<TrackId, PresenceInterval>,
}

impl OccupancyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one frame's complete set of visible track ids.
    ///
    /// Ids not yet open get an interval starting at `now`; open ids missing
    /// from `active` are closed at `now` and returned in ascending id order.
    /// A partial `active` set closes every id it leaves out.
    pub fn observe(&mut self, active: &BTreeSet<TrackId>, now: Timestamp) -> Vec<ClosedInterval> {
        for &track_id in active {
            if !self.open.contains_key(&track_id) {
                tracing::debug!(%track_id, "presence interval opened");
                self.open.insert(track_id, PresenceInterval::open(track_id, now));
            }
        }

        let departed: Vec<TrackId> = self
            .open
            .keys()
            .filter(|id| !active.contains(id))
            .copied()
            .collect();

        let mut closed = Vec::with_capacity(departed.len());
        for track_id in departed {
            if let Some(interval) = self.open.remove(&track_id) {
                let interval = interval.close(now);
                tracing::debug!(
                    %track_id,
                    duration_secs = interval.duration().num_seconds(),
                    "presence interval closed"
                );
                closed.push(interval);
            }
        }
        closed
    }

    /// Close every open interval at `now`, as if an empty frame arrived.
    pub fn close_all(&mut self, now: Timestamp) -> Vec<ClosedInterval> {
        self.observe(&BTreeSet::new(), now)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn is_open(&self, track_id: TrackId) -> bool {
        self.open.contains_key(&track_id)
    }

    pub fn get(&self, track_id: TrackId) -> Option<&PresenceInterval> {
        self.open.get(&track_id)
    }

    pub fn open_intervals(&self) -> impl Iterator<Item = &PresenceInterval> {
        self.open.values()
    }
}
