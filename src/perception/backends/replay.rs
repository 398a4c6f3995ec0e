//! Scene-script backends.
//!
//! A replay script lists what the two perception capabilities "see" on each
//! successive analysis cycle. The object detector steps through the script
//! one cycle per call and the landmarker answers for the detector's current
//! cycle.
//!
//! ```json
//! {
//!   "repeat": false,
//!   "cycles": [
//!     { "objects": [{ "label": "person", "score": 0.91 }],
//!       "faces": [{ "confidence": 0.96, "horizontal": 0.0, "vertical": 0.0 }] },
//!     { "objects": [], "faces": [] },
//!     { "fail": "object_detection" }
//!   ]
//! }
//! ```
//!
//! Once the script is exhausted the last cycle is held, unless `repeat` is
//! set, in which case it wraps around.

use std::path::Path;
use std::cell::Cell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::error::{ProctorError, ProctorResult};
use crate::perception::backend::{Capability, FaceLandmarker, ObjectDetector};
use crate::perception::result::{FaceSample, Landmarks, Point, Prediction};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub cycles: Vec<ScriptCycle>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScriptCycle {
    #[serde(default)]
    pub objects: Vec<Prediction>,
    #[serde(default)]
    pub faces: Vec<ScriptFace>,
    /// Capability whose call fails on this cycle.
    #[serde(default)]
    pub fail: Option<Capability>,
}

/// A face either as explicit landmarks or as a synthetic frontal face with
/// the head turned `horizontal`/`vertical` outer-eye spans from neutral.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScriptFace {
    #[serde(default = "default_face_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub horizontal: f32,
    #[serde(default)]
    pub vertical: f32,
    #[serde(default)]
    pub landmarks: Option<Vec<Point>>,
}

fn default_face_confidence() -> f32 {
    0.95
}

impl ScriptFace {
    fn to_sample(&self) -> FaceSample {
        let landmarks = match &self.landmarks {
            Some(points) => Landmarks::new(points.clone()),
            None => Landmarks::synthetic(self.horizontal, self.vertical),
        };
        FaceSample {
            landmarks,
            confidence: self.confidence,
        }
    }
}

impl ReplayScript {
    pub fn from_json(raw: &str) -> Result<Self> {
        let script: ReplayScript =
            serde_json::from_str(raw).map_err(|e| anyhow!("invalid replay script: {}", e))?;
        Ok(script)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read replay script {}: {}", path.display(), e))?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Build a detector/landmarker pair sharing this script.
    pub fn into_backends(self) -> (ReplayObjectDetector, ReplayFaceLandmarker) {
        let state = Rc::new(ScriptState {
            script: self,
            next: Cell::new(0),
            current: Cell::new(0),
        });
        (
            ReplayObjectDetector {
                state: state.clone(),
            },
            ReplayFaceLandmarker { state },
        )
    }
}

/// Position within a script. The object detector advances it once per
/// call; the landmarker reads the cycle the detector last moved to, so a
/// cycle abandoned after a detector failure cannot desynchronise the pair.
struct ScriptState {
    script: ReplayScript,
    next: Cell<usize>,
    current: Cell<usize>,
}

impl ScriptState {
    fn advance(&self) -> Option<&ScriptCycle> {
        let position = self.next.get();
        self.next.set(position + 1);
        self.current.set(position);
        self.cycle(position)
    }

    fn current(&self) -> Option<&ScriptCycle> {
        self.cycle(self.current.get())
    }

    fn cycle(&self, position: usize) -> Option<&ScriptCycle> {
        let len = self.script.cycles.len();
        if len == 0 {
            return None;
        }
        let index = if self.script.repeat {
            position % len
        } else {
            position.min(len - 1)
        };
        self.script.cycles.get(index)
    }
}

fn scripted_failure(capability: Capability) -> ProctorError {
    ProctorError::InferenceFailure(format!("scripted {} failure", capability))
}

pub struct ReplayObjectDetector {
    state: Rc<ScriptState>,
}

impl ObjectDetector for ReplayObjectDetector {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(
        &mut self,
        _pixels: &[u8],
        _width: u32,
        _height: u32,
    ) -> ProctorResult<Vec<Prediction>> {
        match self.state.advance() {
            Some(cycle) if cycle.fail == Some(Capability::ObjectDetection) => {
                Err(scripted_failure(Capability::ObjectDetection))
            }
            Some(cycle) => Ok(cycle.objects.clone()),
            None => Ok(Vec::new()),
        }
    }
}

pub struct ReplayFaceLandmarker {
    state: Rc<ScriptState>,
}

impl FaceLandmarker for ReplayFaceLandmarker {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect_faces(
        &mut self,
        _pixels: &[u8],
        _width: u32,
        _height: u32,
    ) -> ProctorResult<Vec<FaceSample>> {
        match self.state.current() {
            Some(cycle) if cycle.fail == Some(Capability::FaceLandmarks) => {
                Err(scripted_failure(Capability::FaceLandmarks))
            }
            Some(cycle) => Ok(cycle.faces.iter().map(ScriptFace::to_sample).collect()),
            None => Ok(Vec::new()),
        }
    }
}
