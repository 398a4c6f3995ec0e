use crate::error::{ProctorError, ProctorResult};
use crate::frame::InferenceView;
use crate::perception::backend::{Capability, FaceLandmarker, ObjectDetector};
use crate::perception::result::{FaceSample, Prediction};

/// Facade over the two perception capabilities.
///
/// Each capability carries its own readiness flag; the adapter is ready only
/// when both are. Loads may complete in either order.
pub struct PerceptionAdapter {
    objects: Box<dyn ObjectDetector>,
    faces: Box<dyn FaceLandmarker>,
    objects_ready: bool,
    faces_ready: bool,
}

impl PerceptionAdapter {
    pub fn new<O, F>(objects: O, faces: F) -> Self
    where
        O: ObjectDetector + 'static,
        F: FaceLandmarker + 'static,
    {
        Self::from_boxed(Box::new(objects), Box::new(faces))
    }

    pub fn from_boxed(objects: Box<dyn ObjectDetector>, faces: Box<dyn FaceLandmarker>) -> Self {
        Self {
            objects,
            faces,
            objects_ready: false,
            faces_ready: false,
        }
    }

    /// Load one capability and mark it ready on success.
    pub fn load(&mut self, capability: Capability) -> ProctorResult<()> {
        let (name, result) = match capability {
            Capability::ObjectDetection => (self.objects.name(), self.objects.load()),
            Capability::FaceLandmarks => (self.faces.name(), self.faces.load()),
        };
        match result {
            Ok(()) => {
                log::info!("perception: {} ready (backend={})", capability, name);
                self.mark_ready(capability);
                Ok(())
            }
            Err(e) => {
                log::warn!("perception: {} failed to load: {}", capability, e);
                Err(ProctorError::CapabilityUnavailable(format!(
                    "{} ({}): {}",
                    capability, name, e
                )))
            }
        }
    }

    /// Record that a capability finished loading elsewhere.
    pub fn mark_ready(&mut self, capability: Capability) {
        match capability {
            Capability::ObjectDetection => self.objects_ready = true,
            Capability::FaceLandmarks => self.faces_ready = true,
        }
    }

    pub fn is_capability_ready(&self, capability: Capability) -> bool {
        match capability {
            Capability::ObjectDetection => self.objects_ready,
            Capability::FaceLandmarks => self.faces_ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.objects_ready && self.faces_ready
    }

    /// False when either backend reports an unrecoverable failure.
    pub fn is_healthy(&self) -> bool {
        self.objects.is_healthy() && self.faces.is_healthy()
    }

    pub fn backend_names(&self) -> (&'static str, &'static str) {
        (self.objects.name(), self.faces.name())
    }

    pub fn detect_objects(&mut self, view: &InferenceView<'_>) -> ProctorResult<Vec<Prediction>> {
        self.require(Capability::ObjectDetection)?;
        let objects = &mut self.objects;
        view.with_pixels(|pixels, width, height| objects.detect(pixels, width, height))
            .map_err(|e| inference_failure(Capability::ObjectDetection, e))
    }

    pub fn detect_faces(&mut self, view: &InferenceView<'_>) -> ProctorResult<Vec<FaceSample>> {
        self.require(Capability::FaceLandmarks)?;
        let faces = &mut self.faces;
        view.with_pixels(|pixels, width, height| faces.detect_faces(pixels, width, height))
            .map_err(|e| inference_failure(Capability::FaceLandmarks, e))
    }

    fn require(&self, capability: Capability) -> ProctorResult<()> {
        if self.is_capability_ready(capability) {
            Ok(())
        } else {
            Err(ProctorError::CapabilityUnavailable(format!(
                "{} is not loaded",
                capability
            )))
        }
    }
}

fn inference_failure(capability: Capability, err: ProctorError) -> ProctorError {
    match err {
        ProctorError::InferenceFailure(msg) => {
            ProctorError::InferenceFailure(format!("{}: {}", capability, msg))
        }
        other => ProctorError::InferenceFailure(format!("{}: {}", capability, other)),
    }
}
