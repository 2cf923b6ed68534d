//! Presence intervals for tracked subjects.

use chrono::{NaiveDateTime, SubsecRound, TimeDelta};

use crate::occupancy::track_id::TrackId;

/// Wall-clock local time at second resolution.
pub type Timestamp = NaiveDateTime;

/// Format of every timestamp written to the working log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Drop sub-second precision so in-memory values match what the log stores.
#[inline]
pub fn truncate_to_second(ts: Timestamp) -> Timestamp {
    ts.trunc_subsecs(0)
}

/// Lifecycle of a presence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalState {
    /// Subject is currently visible; no end time yet
    #[default]
    Open,
    /// Subject disappeared; the interval is immutable from here on
    Closed,
}

/// A presence interval as held by the occupancy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceInterval {
    /// Track identifier from the upstream tracker
    pub track_id: TrackId,
    /// First frame in which the track was visible
    pub start_time: Timestamp,
    /// First frame in which the track was no longer visible
    pub end_time: Option<Timestamp>,
}

impl PresenceInterval {
    pub(crate) fn open(track_id: TrackId, now: Timestamp) -> Self {
        Self {
            track_id,
            start_time: truncate_to_second(now),
            end_time: None,
        }
    }

    pub fn state(&self) -> IntervalState {
        match self.end_time {
            Some(_) => IntervalState::Closed,
            None => IntervalState::Open,
        }
    }

    /// Consume the open interval and produce its immutable closed form.
    pub(crate) fn close(self, now: Timestamp) -> ClosedInterval {
        ClosedInterval {
            track_id: self.track_id,
            start_time: self.start_time,
            end_time: truncate_to_second(now),
        }
    }
}

/// A finished presence interval, ready to be appended to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClosedInterval {
    pub track_id: TrackId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl ClosedInterval {
    pub fn new(track_id: TrackId, start_time: Timestamp, end_time: Timestamp) -> Self {
        Self {
            track_id,
            start_time,
            end_time,
        }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    pub fn as_presence(&self) -> PresenceInterval {
        PresenceInterval {
            track_id: self.track_id,
            start_time: self.start_time,
            end_time: Some(self.end_time),
        }
    }
}
