//! Frame analyzer: one inference cycle over the current frame.
//!
//! Runs the object detector and the face landmarker, then folds both outputs
//! into a single immutable `DetectionResult`. A backend error abandons the
//! cycle; degenerate face geometry only drops the head-pose field.

use serde::{Deserialize, Serialize};

use crate::error::ProctorResult;
use crate::frame::InferenceView;
use crate::head_pose::{HeadPoseEstimator, HeadPoseResult};
use crate::perception::{PerceptionAdapter, Prediction};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
pub const DEFAULT_RAW_DETECTION_LIMIT: usize = 10;
pub const DEFAULT_PROHIBITED_KEYWORDS: &[&str] = &[
    "cell phone",
    "phone",
    "mobile",
    "book",
    "laptop",
    "computer",
    "tv",
    "monitor",
    "keyboard",
    "mouse",
    "remote",
];

const PERSON_LABEL: &str = "person";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Clear,
    Violation,
}

/// Structured outcome of one analysis cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub people_count: u32,
    /// Exactly one person in frame.
    pub student_visible: bool,
    /// Distinct prohibited labels, in first-seen order.
    pub prohibited_objects: Vec<String>,
    /// Predictions above the confidence threshold, first N in detector order.
    pub raw_detections: Vec<Prediction>,
    pub head_pose: Option<HeadPoseResult>,
    pub status: FrameStatus,
}

impl DetectionResult {
    pub fn is_violation(&self) -> bool {
        self.status == FrameStatus::Violation
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzerSettings {
    /// Predictions must score strictly above this to count.
    pub confidence_threshold: f32,
    pub raw_detection_limit: usize,
    /// Lower-case substrings; a label containing any of them is prohibited.
    pub prohibited_keywords: Vec<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            raw_detection_limit: DEFAULT_RAW_DETECTION_LIMIT,
            prohibited_keywords: DEFAULT_PROHIBITED_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FrameAnalyzer {
    settings: AnalyzerSettings,
    estimator: HeadPoseEstimator,
}

impl FrameAnalyzer {
    pub fn new(settings: AnalyzerSettings, estimator: HeadPoseEstimator) -> Self {
        let settings = AnalyzerSettings {
            prohibited_keywords: settings
                .prohibited_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            ..settings
        };
        Self {
            settings,
            estimator,
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Run one full cycle against the current frame.
    pub fn analyze(
        &self,
        view: &InferenceView<'_>,
        perception: &mut PerceptionAdapter,
    ) -> ProctorResult<DetectionResult> {
        let predictions = perception.detect_objects(view)?;
        let faces = perception.detect_faces(view)?;
        let head_pose = self.estimator.estimate(&faces);
        Ok(self.summarize(predictions, head_pose))
    }

    /// Fold raw predictions and head pose into a `DetectionResult`.
    pub fn summarize(
        &self,
        predictions: Vec<Prediction>,
        head_pose: Option<HeadPoseResult>,
    ) -> DetectionResult {
        let confident: Vec<Prediction> = predictions
            .into_iter()
            .filter(|p| p.score > self.settings.confidence_threshold)
            .collect();

        let people_count = confident
            .iter()
            .filter(|p| p.label.eq_ignore_ascii_case(PERSON_LABEL))
            .count() as u32;

        let mut prohibited_objects: Vec<String> = Vec::new();
        for prediction in &confident {
            if self.is_prohibited(&prediction.label)
                && !prohibited_objects.contains(&prediction.label)
            {
                prohibited_objects.push(prediction.label.clone());
            }
        }

        let looking_away = head_pose.as_ref().is_some_and(|pose| pose.looking_away);
        let status = if people_count != 1 || !prohibited_objects.is_empty() || looking_away {
            FrameStatus::Violation
        } else {
            FrameStatus::Clear
        };

        let mut raw_detections = confident;
        raw_detections.truncate(self.settings.raw_detection_limit);

        DetectionResult {
            people_count,
            student_visible: people_count == 1,
            prohibited_objects,
            raw_detections,
            head_pose,
            status,
        }
    }

    fn is_prohibited(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.settings
            .prohibited_keywords
            .iter()
            .any(|keyword| label.contains(keyword.as_str()))
    }
}
