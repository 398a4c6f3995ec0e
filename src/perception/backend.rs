use serde::{Deserialize, Serialize};

use crate::error::ProctorResult;
use crate::perception::result::{FaceSample, Prediction};

/// The two perception capabilities the pipeline depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ObjectDetection,
    FaceLandmarks,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::ObjectDetection => f.write_str("object detection"),
            Capability::FaceLandmarks => f.write_str("face landmarks"),
        }
    }
}

/// General object detector (COCO-style labels).
///
/// # Audit Boundary
///
/// Implementations receive pixels for the duration of `detect` only. They
/// must not store, write or transmit them, and must not compute identity
/// outputs (embeddings, face matching).
pub trait ObjectDetector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Acquire model weights. Called once before the first `detect`.
    fn load(&mut self) -> ProctorResult<()> {
        Ok(())
    }

    /// Run detection on a frame. Predictions are returned unfiltered, in
    /// detector-native order.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> ProctorResult<Vec<Prediction>>;

    /// False once the backend has failed in a way that a retry cannot fix.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Face detector with 68-point landmarks. Same audit boundary as
/// `ObjectDetector`.
pub trait FaceLandmarker {
    fn name(&self) -> &'static str;

    fn load(&mut self) -> ProctorResult<()> {
        Ok(())
    }

    /// Detect faces on a frame. Zero or more samples, any order.
    fn detect_faces(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> ProctorResult<Vec<FaceSample>>;

    fn is_healthy(&self) -> bool {
        true
    }
}
