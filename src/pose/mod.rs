pub mod crop;
#[cfg(feature = "desktop")]
pub mod detector;
pub mod face;
#[cfg(feature = "desktop")]
pub mod face_detector;
pub mod keypoint;
#[cfg(feature = "desktop")]
pub mod preprocess;
pub mod source;
pub mod synthetic;
pub mod window;

pub use crop::{clip_to_frame, face_bbox_from_pose, remap_landmarks, BBox, CropRegion};
#[cfg(feature = "desktop")]
pub use detector::{OnnxKeypointSource, PoseDetector};
pub use face::{FaceCapability, FaceLandmarks};
#[cfg(feature = "desktop")]
pub use face_detector::FaceLandmarker;
pub use keypoint::{Keypoint, KeypointIndex, Pose, PoseFrame};
#[cfg(feature = "desktop")]
pub use preprocess::{preprocess_for_face, preprocess_for_movenet};
pub use source::{CapturedFrame, FrameSource, KeypointSource};
pub use synthetic::{ScriptedSource, SyntheticDetector};
pub use window::FrameWindow;
