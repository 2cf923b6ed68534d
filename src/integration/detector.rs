//! Detection events and the trait for inference backends.

use std::collections::BTreeSet;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::occupancy::TrackId;

/// Label of the only class that takes part in occupancy tracking.
pub const PERSON_LABEL: &str = "person";

/// Video frame as a `height x width x 3` RGB buffer.
pub type Frame = Array3<u8>;

/// One detection reported by the inference backend for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label, e.g. `"person"`
    pub label: String,
    /// Detection confidence score
    pub confidence: f32,
    /// Identifier attached by the upstream tracker, if any
    #[serde(default)]
    pub track_id: Option<TrackId>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, track_id: Option<TrackId>) -> Self {
        Self {
            label: label.into(),
            confidence,
            track_id,
        }
    }

    pub fn person(track_id: u64, confidence: f32) -> Self {
        Self::new(PERSON_LABEL, confidence, Some(TrackId::new(track_id)))
    }

    pub fn is_person(&self) -> bool {
        self.label == PERSON_LABEL
    }

    /// Key used in the occupancy table. Detections without a tracker id
    /// fall into [`TrackId::UNTRACKED`].
    pub fn occupancy_id(&self) -> TrackId {
        self.track_id.unwrap_or(TrackId::UNTRACKED)
    }
}

/// The complete set of person track ids visible in one frame.
pub fn active_person_ids(detections: &[Detection]) -> BTreeSet<TrackId> {
    detections
        .iter()
        .filter(|d| d.is_person())
        .map(Detection::occupancy_id)
        .collect()
}

/// Trait for object detection inference backends.
///
/// Implement this trait to feed any detection model into the occupancy
/// pipeline.
///
/// # Example
///
/// ```ignore
/// use occupancy_log::{Detection, DetectionSource, Frame};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference and return detections
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error;

    /// Run inference on one frame and return its detections.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error>;
}
