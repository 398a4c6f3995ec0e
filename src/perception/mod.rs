//! Perception adapter: thin facade over the object detector and the face
//! landmark detector. Both are opaque capability providers.

mod adapter;
mod backend;
pub mod backends;
mod result;

pub use adapter::PerceptionAdapter;
pub use backend::{Capability, FaceLandmarker, ObjectDetector};
pub use backends::{
    ReplayFaceLandmarker, ReplayObjectDetector, ReplayScript, StubFaceLandmarker,
    StubObjectDetector,
};
pub use result::{FaceSample, Landmarks, Point, Prediction, LANDMARK_COUNT, NEUTRAL_NOSE_DROP};
