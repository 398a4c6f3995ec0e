//! Synthetic webcam (`stub://`) for tests and offline runs.

use crate::camera::{CameraConfig, CameraSource, CameraStats};
use crate::error::{ProctorError, ProctorResult};
use crate::frame::Frame;

const DENIED_URL: &str = "stub://denied";

pub struct SyntheticCamera {
    config: CameraConfig,
    open: bool,
    frame_count: u64,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            open: false,
            frame_count: 0,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }
}

impl CameraSource for SyntheticCamera {
    fn open(&mut self) -> ProctorResult<()> {
        if self.config.url == DENIED_URL {
            return Err(ProctorError::CameraAccessDenied(
                "permission denied by user".to_string(),
            ));
        }
        if !self.open {
            log::info!(
                "camera: opened {} at {}x{} (synthetic)",
                self.config.url,
                self.config.width,
                self.config.height
            );
        }
        self.open = true;
        Ok(())
    }

    fn capture(&mut self) -> ProctorResult<Frame> {
        if !self.open {
            return Err(ProctorError::FrameCapture("camera is not open".to_string()));
        }
        self.frame_count += 1;
        Ok(Frame::new(
            self.generate_pixels(),
            self.config.width,
            self.config.height,
            self.frame_count,
        ))
    }

    fn release(&mut self) {
        if self.open {
            log::info!("camera: released {}", self.config.url);
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
            open: self.open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> CameraConfig {
        CameraConfig {
            url: url.to_string(),
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn denied_url_refuses_access() {
        let mut camera = SyntheticCamera::new(config("stub://denied"));
        assert!(matches!(
            camera.open(),
            Err(ProctorError::CameraAccessDenied(_))
        ));
        assert!(!camera.is_open());
    }

    #[test]
    fn capture_requires_open_camera() {
        let mut camera = SyntheticCamera::new(config("stub://webcam"));
        assert!(matches!(camera.capture(), Err(ProctorError::FrameCapture(_))));

        camera.open().unwrap();
        let frame = camera.capture().unwrap();
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.byte_len(), 12);
    }
}
