//! Capture and perception seams of the frame loop.

use std::time::Duration;

use crate::error::SessionError;

use super::face::{FaceCapability, FaceLandmarks};
use super::keypoint::PoseFrame;

/// One captured image with its capture time (since session start).
#[derive(Debug, Clone)]
pub struct CapturedFrame<F> {
    pub image: F,
    pub timestamp: Duration,
}

impl<F> CapturedFrame<F> {
    pub fn new(image: F, timestamp: Duration) -> Self {
        Self { image, timestamp }
    }
}

/// Camera or replay. An error here ends the session.
pub trait FrameSource {
    type Frame;

    fn capture(&mut self) -> Result<CapturedFrame<Self::Frame>, SessionError>;
}

/// Pose and face estimation over a captured image.
///
/// `detect_face` is only called while `face_capability()` is `Available`.
pub trait KeypointSource<F> {
    fn detect_pose(&mut self, frame: &CapturedFrame<F>) -> anyhow::Result<PoseFrame>;

    /// `Ok(None)` when no face is visible in this frame
    fn detect_face(
        &mut self,
        frame: &CapturedFrame<F>,
        pose: &PoseFrame,
    ) -> anyhow::Result<Option<FaceLandmarks>>;

    fn face_capability(&self) -> &FaceCapability;
}
