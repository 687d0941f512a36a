pub mod classifier;
pub mod geometry;

pub use classifier::{Mood, MoodClassifier, MoodHistory, MoodState, MotionCue};
pub use geometry::FaceGeometry;
