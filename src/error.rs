//! Error taxonomy for the proctoring pipeline.
//!
//! Every failure is local to either one analysis cycle or one Start
//! transition. None of them are fatal to the process.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProctorError {
    /// Perception models never finished loading. Blocks Start.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Camera permission denied or no device. Blocks Start.
    #[error("camera access denied: {0}")]
    CameraAccessDenied(String),

    /// The camera was open but could not deliver a frame for this cycle.
    #[error("frame capture failed: {0}")]
    FrameCapture(String),

    /// A detector or landmark call failed. The cycle is abandoned.
    #[error("inference failed: {0}")]
    InferenceFailure(String),

    /// Head-pose math could not be evaluated for this landmark set.
    #[error("degenerate face geometry: {0}")]
    GeometryDegenerate(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProctorError {
    /// Errors that abandon a single cycle but leave monitoring running.
    pub fn is_cycle_local(&self) -> bool {
        matches!(
            self,
            ProctorError::FrameCapture(_) | ProctorError::InferenceFailure(_)
        )
    }
}

pub type ProctorResult<T> = std::result::Result<T, ProctorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_local_errors_are_classified() {
        assert!(ProctorError::InferenceFailure("x".into()).is_cycle_local());
        assert!(ProctorError::FrameCapture("x".into()).is_cycle_local());
        assert!(!ProctorError::CameraAccessDenied("x".into()).is_cycle_local());
        assert!(!ProctorError::CapabilityUnavailable("x".into()).is_cycle_local());
    }

    #[test]
    fn display_includes_context() {
        let err = ProctorError::CameraAccessDenied("permission denied".into());
        assert_eq!(err.to_string(), "camera access denied: permission denied");
    }
}
