use crate::error::ProctorResult;
use crate::perception::backend::{FaceLandmarker, ObjectDetector};
use crate::perception::result::{FaceSample, Landmarks, Prediction};

/// Stub object detector for testing. Always sees one person at the desk.
#[derive(Default)]
pub struct StubObjectDetector {
    calls: u64,
}

impl StubObjectDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of inference calls served.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl ObjectDetector for StubObjectDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        _pixels: &[u8],
        _width: u32,
        _height: u32,
    ) -> ProctorResult<Vec<Prediction>> {
        self.calls += 1;
        Ok(vec![Prediction::new("person", 0.92)])
    }
}

/// Stub face landmarker. Always sees one frontal face looking at the screen.
#[derive(Default)]
pub struct StubFaceLandmarker {
    calls: u64,
}

impl StubFaceLandmarker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of inference calls served.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl FaceLandmarker for StubFaceLandmarker {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect_faces(
        &mut self,
        _pixels: &[u8],
        _width: u32,
        _height: u32,
    ) -> ProctorResult<Vec<FaceSample>> {
        self.calls += 1;
        Ok(vec![FaceSample {
            landmarks: Landmarks::synthetic(0.0, 0.0),
            confidence: 0.97,
        }])
    }
}
