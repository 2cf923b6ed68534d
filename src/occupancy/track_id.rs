use std::fmt;

use serde::{Deserialize, Serialize};

/// Track identifier assigned by the upstream tracker.
///
/// Identifiers are only stable within one tracker session; they may be
/// reused after the tracker restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl TrackId {
    /// Bucket shared by every person detection that carries no stable
    /// identifier. All such detections collapse into one presence interval
    /// for as long as at least one of them stays visible.
    pub const UNTRACKED: TrackId = TrackId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether this is the shared untracked bucket.
    #[inline]
    pub fn is_untracked(self) -> bool {
        self == Self::UNTRACKED
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untracked_sentinel() {
        assert!(TrackId::UNTRACKED.is_untracked());
        assert!(TrackId::default().is_untracked());
        assert!(!TrackId::new(7).is_untracked());
    }

    #[test]
    fn test_display_is_bare_integer() {
        assert_eq!(TrackId::new(42).to_string(), "42");
        assert_eq!(TrackId::UNTRACKED.to_string(), "0");
    }
}
