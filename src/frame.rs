//! Frame isolation layer.
//!
//! - `Frame`: opaque container for one camera snapshot. Bytes are private.
//! - `InferenceView`: restricted view handed to perception backends. Pixels
//!   flow into a backend call and only structured results flow out.
//!
//! Frames are single snapshots taken at sparse intervals. Nothing here keeps
//! history between cycles.

use std::time::Instant;

/// Opaque camera snapshot. There is no `Clone` and no byte accessor.
pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Capture sequence number assigned by the camera source.
    pub sequence: u64,

    captured_at: Instant,
}

impl Frame {
    /// Create a new frame. Called by camera sources.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn inference_view(&self) -> InferenceView<'_> {
        InferenceView { frame: self }
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Restricted view of a frame for inference.
///
/// Backends see pixels only for the duration of `with_pixels`; the closure
/// signature prevents the slice from escaping the call.
pub struct InferenceView<'a> {
    frame: &'a Frame,
}

impl<'a> InferenceView<'a> {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn sequence(&self) -> u64 {
        self.frame.sequence
    }

    /// Run `f` against the pixel slice.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&[u8], u32, u32) -> R) -> R {
        f(&self.frame.data, self.frame.width, self.frame.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_view_provides_metadata() {
        let frame = Frame::new(vec![1, 2, 3], 640, 480, 7);
        let view = frame.inference_view();

        assert_eq!(view.width(), 640);
        assert_eq!(view.height(), 480);
        assert_eq!(view.sequence(), 7);
    }

    #[test]
    fn with_pixels_passes_dimensions() {
        let frame = Frame::new(vec![9; 12], 2, 2, 0);
        let total = frame
            .inference_view()
            .with_pixels(|pixels, w, h| pixels.len() as u32 + w + h);
        assert_eq!(total, 16);
        assert_eq!(frame.byte_len(), 12);
    }
}
