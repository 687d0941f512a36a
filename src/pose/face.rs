//! 68-point facial landmark scheme (iBUG 300-W ordering).

/// Number of points in the landmark scheme.
pub const FACE_LANDMARK_COUNT: usize = 68;

pub const JAW: std::ops::Range<usize> = 0..17;
pub const RIGHT_BROW: std::ops::Range<usize> = 17..22;
pub const LEFT_BROW: std::ops::Range<usize> = 22..27;
pub const NOSE: std::ops::Range<usize> = 27..36;
pub const RIGHT_EYE: std::ops::Range<usize> = 36..42;
pub const LEFT_EYE: std::ops::Range<usize> = 42..48;
pub const OUTER_LIPS: std::ops::Range<usize> = 48..60;
pub const INNER_LIPS: std::ops::Range<usize> = 60..68;

/// One face worth of landmarks, normalised image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    points: [(f32, f32); FACE_LANDMARK_COUNT],
}

impl FaceLandmarks {
    pub fn new(points: [(f32, f32); FACE_LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Builds landmarks from a flat `[x0, y0, x1, y1, ...]` buffer as produced
    /// by landmark regressors. Returns `None` on a length mismatch or
    /// non-finite values.
    pub fn from_flat(values: &[f32]) -> Option<Self> {
        if values.len() != FACE_LANDMARK_COUNT * 2 || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let points = std::array::from_fn(|i| (values[2 * i], values[2 * i + 1]));
        Some(Self { points })
    }

    pub fn point(&self, index: usize) -> (f32, f32) {
        self.points[index]
    }

    pub fn points(&self) -> &[(f32, f32); FACE_LANDMARK_COUNT] {
        &self.points
    }

    pub fn region(&self, range: std::ops::Range<usize>) -> &[(f32, f32)] {
        &self.points[range]
    }
}

/// Whether a face landmark predictor exists for this session.
///
/// Resolved once at startup; downstream code branches on it instead of
/// retrying the predictor every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceCapability {
    Available,
    Unavailable { reason: String },
}

impl FaceCapability {
    pub fn is_available(&self) -> bool {
        matches!(self, FaceCapability::Available)
    }
}
