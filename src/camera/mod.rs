//! Camera capability.
//!
//! A camera is requested at a nominal resolution, produces single snapshots
//! on demand, and must be released deterministically when monitoring stops.
//!
//! Sources:
//! - `stub://<name>`: synthetic webcam (always grants access)
//! - `stub://denied`: synthetic webcam that refuses access (permission denied)
//!
//! Camera sources MUST NOT:
//! - Store frames to disk
//! - Retain frames beyond handoff to the frame analyzer

pub mod synthetic;

use crate::error::{ProctorError, ProctorResult};
use crate::frame::Frame;

pub use synthetic::SyntheticCamera;

pub const DEFAULT_CAMERA_URL: &str = "stub://webcam";
pub const DEFAULT_CAMERA_WIDTH: u32 = 1280;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 720;

/// Configuration for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    pub url: String,
    /// Nominal capture width requested from the device.
    pub width: u32,
    /// Nominal capture height requested from the device.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CAMERA_URL.to_string(),
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
    pub open: bool,
}

/// Live video source used by the session controller.
pub trait CameraSource {
    /// Request access to the device. Fails with `CameraAccessDenied`.
    fn open(&mut self) -> ProctorResult<()>;

    /// Capture the current frame. Only valid while open.
    fn capture(&mut self) -> ProctorResult<Frame>;

    /// Release the device. Releasing a closed camera is a no-op.
    fn release(&mut self);

    fn is_open(&self) -> bool;

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> CameraStats;
}

/// Camera selected from a `CameraConfig` URL.
pub struct Camera {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
}

impl Camera {
    pub fn new(config: CameraConfig) -> ProctorResult<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(ProctorError::InvalidConfig(
                "camera resolution must be non-zero".to_string(),
            ));
        }
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            Err(ProctorError::CameraAccessDenied(format!(
                "no camera backend available for {}",
                config.url
            )))
        }
    }
}

impl CameraSource for Camera {
    fn open(&mut self) -> ProctorResult<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.open(),
        }
    }

    fn capture(&mut self) -> ProctorResult<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.capture(),
        }
    }

    fn release(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.release(),
        }
    }

    fn is_open(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_open(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_stub_urls() {
        let err = Camera::new(CameraConfig {
            url: "v4l2:///dev/video0".to_string(),
            ..CameraConfig::default()
        })
        .err()
        .expect("non-stub url must fail");
        assert!(matches!(err, ProctorError::CameraAccessDenied(_)));
    }

    #[test]
    fn rejects_zero_resolution() {
        let err = Camera::new(CameraConfig {
            width: 0,
            ..CameraConfig::default()
        })
        .err()
        .expect("zero width must fail");
        assert!(matches!(err, ProctorError::InvalidConfig(_)));
    }

    #[test]
    fn stub_camera_opens_and_releases() {
        let mut camera = Camera::new(CameraConfig {
            url: "stub://test".to_string(),
            width: 4,
            height: 4,
        })
        .unwrap();
        camera.open().unwrap();
        assert!(camera.is_open());
        camera.capture().unwrap();
        camera.release();
        assert!(!camera.is_open());
        assert_eq!(camera.stats().frames_captured, 1);
    }
}
