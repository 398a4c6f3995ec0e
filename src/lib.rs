//! Proctor Kernel
//!
//! This crate implements the inference pipeline of an exam-proctoring
//! monitor: a periodic loop that snapshots a webcam frame, runs object
//! detection and face-landmark detection on it, derives head pose, and turns
//! the combined result into timestamped violation events.
//!
//! # Architecture
//!
//! The pipeline is a single-owner, clock-driven state machine:
//!
//! 1. **Perception** (`perception`): two independently loaded capabilities
//!    behind one readiness flag. Backends only ever see pixels through
//!    `InferenceView::with_pixels`.
//! 2. **Head pose** (`head_pose`): nose-tip offset from the eye midpoint,
//!    normalised by the outer-eye-corner span.
//! 3. **Frame analysis** (`analyzer`): confidence filtering, person count,
//!    prohibited-object matching, frame status.
//! 4. **Classification** (`classifier`): violation events and the
//!    looking-away debounce.
//! 5. **Session** (`session`): timers, in-flight guard, start/stop, the
//!    bounded violation log and the counters.
//!
//! # Module Structure
//!
//! - `frame`: Frame and the restricted `InferenceView`
//! - `camera`: Camera capability (open, capture, release)
//! - `config`: `ProctorConfig` for the `proctord` daemon
//! - `error`: `ProctorError`, the library error type

pub mod analyzer;
pub mod camera;
pub mod classifier;
pub mod config;
pub mod error;
pub mod frame;
pub mod head_pose;
pub mod perception;
pub mod session;
pub mod violation_log;

pub use analyzer::{AnalyzerSettings, DetectionResult, FrameAnalyzer, FrameStatus};
pub use camera::{Camera, CameraConfig, CameraSource, CameraStats, SyntheticCamera};
pub use classifier::{
    Classification, ClassifierSettings, DebouncePolicy, DebounceState, Severity,
    ViolationClassifier, ViolationEvent,
};
pub use config::ProctorConfig;
pub use error::{ProctorError, ProctorResult};
pub use frame::{Frame, InferenceView};
pub use head_pose::{GazeDirection, HeadPoseEstimator, HeadPoseResult, HeadPoseThresholds};
pub use perception::{
    Capability, FaceLandmarker, FaceSample, Landmarks, ObjectDetector, PerceptionAdapter, Point,
    Prediction, ReplayScript, StubFaceLandmarker, StubObjectDetector,
};
pub use session::{
    format_uptime, CycleOutcome, CycleTicket, ScheduleSettings, SessionController,
    SessionSettings, SessionSnapshot, SessionState, SessionStats,
};
pub use violation_log::ViolationLog;
