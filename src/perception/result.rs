use serde::{Deserialize, Serialize};

/// One object-detector prediction, in detector-native order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Confidence in 0..=1.
    pub score: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Number of points in the fixed 68-point face topology.
pub const LANDMARK_COUNT: usize = 68;

const NOSE: std::ops::Range<usize> = 27..36;
const NOSE_TIP: usize = 30;
const LEFT_EYE: std::ops::Range<usize> = 36..42;
const RIGHT_EYE: std::ops::Range<usize> = 42..48;
const LEFT_EYE_OUTER: usize = 36;
const RIGHT_EYE_OUTER: usize = 45;

/// Vertical nose-tip offset below the eye line of a neutral frontal face,
/// in outer-eye-span units.
pub const NEUTRAL_NOSE_DROP: f32 = 0.35;

/// Landmark set in the 68-point topology (jaw 0-16, brows 17-26,
/// nose 27-35, eyes 36-47, mouth 48-67). Image coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Landmarks(Vec<Point>);

impl Landmarks {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn is_complete(&self) -> bool {
        self.0.len() >= LANDMARK_COUNT
    }

    pub fn nose(&self) -> Option<&[Point]> {
        self.0.get(NOSE)
    }

    pub fn nose_tip(&self) -> Option<Point> {
        self.0.get(NOSE_TIP).copied()
    }

    pub fn left_eye(&self) -> Option<&[Point]> {
        self.0.get(LEFT_EYE)
    }

    pub fn right_eye(&self) -> Option<&[Point]> {
        self.0.get(RIGHT_EYE)
    }

    /// Outer corner of the left eye (point 36).
    pub fn left_eye_outer(&self) -> Option<Point> {
        self.0.get(LEFT_EYE_OUTER).copied()
    }

    /// Outer corner of the right eye (point 45).
    pub fn right_eye_outer(&self) -> Option<Point> {
        self.0.get(RIGHT_EYE_OUTER).copied()
    }

    /// Build a frontal face turned by `horizontal`/`vertical` from a
    /// neutral pose, in units of outer-eye span. At `(0.0, 0.0)` the nose tip
    /// sits centred, `NEUTRAL_NOSE_DROP` spans below the eye line. Used by
    /// the stub and replay backends.
    pub fn synthetic(horizontal: f32, vertical: f32) -> Self {
        const CX: f32 = 640.0;
        const CY: f32 = 300.0;
        // Outer corner to outer corner.
        const EYE_SPAN: f32 = 90.0;
        const EYE_HALF_WIDTH: f32 = 10.0;

        let mut points = vec![Point::default(); LANDMARK_COUNT];

        // Jaw line.
        for (i, point) in points.iter_mut().take(17).enumerate() {
            let t = i as f32 / 16.0;
            point.x = CX - 70.0 + 140.0 * t;
            point.y = CY + 40.0 + 60.0 * (1.0 - (2.0 * t - 1.0).powi(2));
        }
        // Brows.
        for (i, point) in points[17..27].iter_mut().enumerate() {
            point.x = CX - 50.0 + 100.0 * (i as f32 / 9.0);
            point.y = CY - 20.0;
        }

        // Each eye is a hexagon with its corners on the eye line.
        let ring = [
            (-EYE_HALF_WIDTH, 0.0),
            (-5.0, -4.0),
            (5.0, -4.0),
            (EYE_HALF_WIDTH, 0.0),
            (5.0, 4.0),
            (-5.0, 4.0),
        ];
        // Ring index 0 is the left end of each eye: the outer corner (36)
        // for the left eye, the inner one (42) for the right eye.
        let eyes = [
            (LEFT_EYE.start, CX - EYE_SPAN / 2.0 + EYE_HALF_WIDTH),
            (RIGHT_EYE.start, CX + EYE_SPAN / 2.0 - EYE_HALF_WIDTH),
        ];
        for (offset, base) in eyes {
            for (k, (dx, dy)) in ring.iter().enumerate() {
                points[offset + k] = Point::new(base + dx, CY + dy);
            }
        }

        let tip = Point::new(
            CX + horizontal * EYE_SPAN,
            CY + (NEUTRAL_NOSE_DROP + vertical) * EYE_SPAN,
        );
        // Bridge runs from between the eyes down to the tip.
        for k in 0..4 {
            let t = k as f32 / 3.0;
            points[NOSE.start + k] =
                Point::new(CX + (tip.x - CX) * t, CY - 5.0 + (tip.y - CY + 5.0) * t);
        }
        points[NOSE_TIP] = tip;
        for k in 0..5 {
            points[31 + k] = Point::new(tip.x - 10.0 + 5.0 * k as f32, tip.y + 6.0);
        }

        // Mouth.
        for (i, point) in points[48..68].iter_mut().enumerate() {
            let angle = i as f32 / 20.0 * std::f32::consts::TAU;
            point.x = CX + 20.0 * angle.cos();
            point.y = CY + 60.0 + 8.0 * angle.sin();
        }

        Self(points)
    }
}

/// One detected face with its landmarks and detection confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceSample {
    pub landmarks: Landmarks,
    /// Detector confidence in 0..=1.
    pub confidence: f32,
}
