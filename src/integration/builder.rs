//! Builder for creating Detection objects from backend outputs.

use crate::integration::detector::{Detection, PERSON_LABEL};
use crate::occupancy::TrackId;

/// Builder for creating `Detection` objects.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    label: String,
    confidence: f32,
    track_id: Option<TrackId>,
}

impl DetectionBuilder {
    /// Create a new detection builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the class label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Shorthand for `label("person")`.
    pub fn person(self) -> Self {
        self.label(PERSON_LABEL)
    }

    /// Set the confidence score.
    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Attach the tracker's unique id.
    pub fn track_id(mut self, id: u64) -> Self {
        self.track_id = Some(TrackId::new(id));
        self
    }

    /// Attach the unique ids reported for the detection. Only a single
    /// unambiguous id is kept; zero or several ids leave it untracked.
    pub fn unique_ids(mut self, ids: &[u64]) -> Self {
        self.track_id = match ids {
            [id] => Some(TrackId::new(*id)),
            _ => None,
        };
        self
    }

    /// Build the final `Detection`.
    pub fn build(self) -> Detection {
        Detection::new(self.label, self.confidence, self.track_id)
    }
}
