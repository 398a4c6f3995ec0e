//! Head-pose estimation from 68-point face landmarks.
//!
//! The nose tip is compared against the midpoint of the two outer eye
//! corners (points 36 and 45). Both offsets are normalised by the horizontal
//! distance between those corners, which makes the result independent of
//! face size and camera distance. The default thresholds assume that span:
//! a neutral frontal face measures about 0.35 vertically.
//!
//! Estimation is stateless: one landmark sample in, one classification out.

use serde::{Deserialize, Serialize};

use crate::error::{ProctorError, ProctorResult};
use crate::perception::{FaceSample, Point};

pub const DEFAULT_HORIZONTAL_THRESHOLD: f32 = 0.3;
pub const DEFAULT_VERTICAL_THRESHOLD: f32 = 0.4;

const MIN_EYE_SPAN: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GazeDirection {
    LookingAtScreen,
    LookingLeft,
    LookingRight,
    LookingUp,
    LookingDown,
    NoFaceDetected,
}

impl GazeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GazeDirection::LookingAtScreen => "Looking at screen",
            GazeDirection::LookingLeft => "Looking left",
            GazeDirection::LookingRight => "Looking right",
            GazeDirection::LookingUp => "Looking up",
            GazeDirection::LookingDown => "Looking down",
            GazeDirection::NoFaceDetected => "No face detected",
        }
    }
}

impl std::fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadPoseResult {
    pub face_detected: bool,
    pub looking_away: bool,
    pub direction: GazeDirection,
    pub horizontal_deviation: f32,
    pub vertical_deviation: f32,
    /// Face detector confidence, 0..=1.
    pub confidence: f32,
}

impl HeadPoseResult {
    /// No face in frame. Counts as looking away.
    pub fn no_face() -> Self {
        Self {
            face_detected: false,
            looking_away: true,
            direction: GazeDirection::NoFaceDetected,
            horizontal_deviation: 0.0,
            vertical_deviation: 0.0,
            confidence: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadPoseThresholds {
    /// `|horizontal| > threshold` means looking left/right.
    pub horizontal: f32,
    /// `vertical > threshold` means down, `< -threshold` means up.
    pub vertical: f32,
}

impl Default for HeadPoseThresholds {
    fn default() -> Self {
        Self {
            horizontal: DEFAULT_HORIZONTAL_THRESHOLD,
            vertical: DEFAULT_VERTICAL_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HeadPoseEstimator {
    thresholds: HeadPoseThresholds,
}

impl HeadPoseEstimator {
    pub fn new(thresholds: HeadPoseThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> HeadPoseThresholds {
        self.thresholds
    }

    /// Estimate head pose from the faces found in one frame.
    ///
    /// Returns `None` when the landmark geometry is degenerate; callers treat
    /// that as "no head-pose data this cycle".
    pub fn estimate(&self, faces: &[FaceSample]) -> Option<HeadPoseResult> {
        match self.try_estimate(faces) {
            Ok(result) => Some(result),
            Err(e) => {
                log::debug!("head pose unavailable: {}", e);
                None
            }
        }
    }

    /// Like `estimate`, but reports why geometry extraction failed.
    pub fn try_estimate(&self, faces: &[FaceSample]) -> ProctorResult<HeadPoseResult> {
        // Only the most confident face is considered.
        let Some(face) = faces
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        else {
            return Ok(HeadPoseResult::no_face());
        };

        let (horizontal, vertical) = deviations(face)?;
        let (looking_away, direction) = self.classify(horizontal, vertical);

        Ok(HeadPoseResult {
            face_detected: true,
            looking_away,
            direction,
            horizontal_deviation: horizontal,
            vertical_deviation: vertical,
            confidence: face.confidence,
        })
    }

    /// First match wins: horizontal, then down, then up.
    pub fn classify(&self, horizontal: f32, vertical: f32) -> (bool, GazeDirection) {
        if horizontal.abs() > self.thresholds.horizontal {
            let direction = if horizontal > 0.0 {
                GazeDirection::LookingRight
            } else {
                GazeDirection::LookingLeft
            };
            (true, direction)
        } else if vertical > self.thresholds.vertical {
            (true, GazeDirection::LookingDown)
        } else if vertical < -self.thresholds.vertical {
            (true, GazeDirection::LookingUp)
        } else {
            (false, GazeDirection::LookingAtScreen)
        }
    }
}

fn deviations(face: &FaceSample) -> ProctorResult<(f32, f32)> {
    let landmarks = &face.landmarks;
    if !landmarks.is_complete() {
        return Err(ProctorError::GeometryDegenerate(format!(
            "expected 68 landmarks, got {}",
            landmarks.points().len()
        )));
    }

    let nose_tip = landmarks
        .nose_tip()
        .ok_or_else(|| ProctorError::GeometryDegenerate("missing nose tip".to_string()))?;
    let left = landmarks
        .left_eye_outer()
        .ok_or_else(|| ProctorError::GeometryDegenerate("missing left eye".to_string()))?;
    let right = landmarks
        .right_eye_outer()
        .ok_or_else(|| ProctorError::GeometryDegenerate("missing right eye".to_string()))?;

    if !(nose_tip.is_finite() && left.is_finite() && right.is_finite()) {
        return Err(ProctorError::GeometryDegenerate(
            "non-finite landmark coordinates".to_string(),
        ));
    }

    let eye_span = right.x - left.x;
    if eye_span.abs() < MIN_EYE_SPAN {
        return Err(ProctorError::GeometryDegenerate(
            "eyes share the same x coordinate".to_string(),
        ));
    }

    let center = Point::new((left.x + right.x) / 2.0, (left.y + right.y) / 2.0);
    let horizontal = (nose_tip.x - center.x) / eye_span;
    let vertical = (nose_tip.y - center.y) / eye_span;
    Ok((horizontal, vertical))
}
