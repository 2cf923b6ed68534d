//! Boundary with the detection pipeline.
//!
//! Detection events come in from an inference backend through
//! [`DetectionSource`]; [`OccupancyPipeline`] turns each frame's person
//! detections into presence intervals and appends closures to the working
//! log. [`FrameAnnotator`] draws the live count back onto the frame.

mod annotator;
mod builder;
mod detector;
mod pipeline;

pub use annotator::{FrameAnnotator, rgb_to_bgr};
pub use builder::DetectionBuilder;
pub use detector::{Detection, DetectionSource, Frame, PERSON_LABEL, active_person_ids};
pub use pipeline::{FrameSummary, OccupancyPipeline};
