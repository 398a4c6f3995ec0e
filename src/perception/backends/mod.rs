pub mod replay;
pub mod stub;

pub use replay::{ReplayFaceLandmarker, ReplayObjectDetector, ReplayScript};
pub use stub::{StubFaceLandmarker, StubObjectDetector};
