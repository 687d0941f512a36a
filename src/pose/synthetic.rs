//! Scripted body motion for the console driver and for tests.
//!
//! A `Figure` turns a high level `Posture` into a 17-keypoint pose, and a
//! `ScriptedSource` plays a queue of `Segment`s at a fixed frame rate with
//! deterministic timestamps.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::SessionError;
use crate::exercise::signal::{MAX_LEAN_DEG, SHOULDER_LEVEL};
use crate::exercise::ExerciseMode;

use super::face::{FaceCapability, FaceLandmarks, FACE_LANDMARK_COUNT};
use super::keypoint::{Keypoint, KeypointIndex, Pose, PoseFrame};
use super::source::{CapturedFrame, FrameSource, KeypointSource};

/// Body configuration in terms of each exercise's own signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Posture {
    /// Arm raise level, 0.0 (hands at hips) .. 1.0 (overhead)
    ArmsAt(f32),
    /// Lateral lean in degrees, negative leans to the left
    Lean(f32),
    /// Squat depth, 0.0 (standing) .. 1.0 (thighs level with knees)
    Squat(f32),
}

impl Posture {
    pub const STANDING: Posture = Posture::ArmsAt(0.0);

    /// Posture whose signal for `mode` is `signal`
    pub fn for_mode(mode: ExerciseMode, signal: f32) -> Posture {
        match mode {
            ExerciseMode::ArmRaise => Posture::ArmsAt(signal),
            ExerciseMode::SideStretch => Posture::Lean(signal * MAX_LEAN_DEG),
            ExerciseMode::ChairSquat => Posture::Squat(signal),
        }
    }

    fn lerp(self, to: Posture, t: f32) -> Posture {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        match (self, to) {
            (Posture::ArmsAt(a), Posture::ArmsAt(b)) => Posture::ArmsAt(mix(a, b)),
            (Posture::Lean(a), Posture::Lean(b)) => Posture::Lean(mix(a, b)),
            (Posture::Squat(a), Posture::Squat(b)) => Posture::Squat(mix(a, b)),
            _ if t < 0.5 => self,
            _ => to,
        }
    }
}

/// Facial expression rendered onto the head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expression {
    Neutral,
    Smile,
    Grimace,
    Gasp,
    Concentrating,
}

impl Expression {
    /// (eye aperture, brow height, mouth aperture, mouth width)
    fn geometry(self) -> (f32, f32, f32, f32) {
        match self {
            Expression::Neutral => (0.30, 0.28, 0.05, 0.55),
            Expression::Smile => (0.25, 0.30, 0.20, 0.70),
            Expression::Grimace => (0.15, 0.16, 0.05, 0.55),
            Expression::Gasp => (0.30, 0.26, 0.70, 0.50),
            Expression::Concentrating => (0.28, 0.22, 0.03, 0.55),
        }
    }
}

/// Body proportions of the scripted player, in normalised image coordinates
#[derive(Debug, Clone)]
pub struct Figure {
    pub center_x: f32,
    pub shoulder_y: f32,
    pub hip_y: f32,
    pub knee_y: f32,
    pub ankle_y: f32,
    pub shoulder_half_width: f32,
    pub hip_half_width: f32,
    pub head_height: f32,
    /// Distance between the outer eye corners
    pub eye_span: f32,
    pub confidence: f32,
}

impl Default for Figure {
    fn default() -> Self {
        Self {
            center_x: 0.5,
            shoulder_y: 0.30,
            hip_y: 0.55,
            knee_y: 0.80,
            ankle_y: 0.95,
            shoulder_half_width: 0.10,
            hip_half_width: 0.07,
            head_height: 0.12,
            eye_span: 0.06,
            confidence: 0.9,
        }
    }
}

impl Figure {
    fn torso(&self) -> f32 {
        self.hip_y - self.shoulder_y
    }

    pub fn pose(&self, posture: Posture) -> Pose {
        let c = self.confidence;
        let torso = self.torso();
        let mut pose = Pose::empty();

        // 腰の高さ（スクワットでは腰から上が沈む）
        let hip_y = match posture {
            Posture::Squat(depth) => self.knee_y - torso * (1.0 - depth.clamp(0.0, 1.0)),
            _ => self.hip_y,
        };
        let hip = (self.center_x, hip_y);

        // 腰→肩の向き（側屈のみ傾く）
        let lean = match posture {
            Posture::Lean(deg) => deg.to_radians(),
            _ => 0.0,
        };
        let up = (lean.sin(), -lean.cos());
        let shoulder = (hip.0 + torso * up.0, hip.1 + torso * up.1);
        let nose = (shoulder.0 + self.head_height * up.0, shoulder.1 + self.head_height * up.1);

        let set = |pose: &mut Pose, index: KeypointIndex, (x, y): (f32, f32)| {
            pose.set(index, Keypoint::new(x, y, c));
        };

        set(&mut pose, KeypointIndex::Nose, nose);
        set(&mut pose, KeypointIndex::LeftEye, (nose.0 + 0.025, nose.1 - 0.02));
        set(&mut pose, KeypointIndex::RightEye, (nose.0 - 0.025, nose.1 - 0.02));
        set(&mut pose, KeypointIndex::LeftEar, (nose.0 + 0.05, nose.1 - 0.01));
        set(&mut pose, KeypointIndex::RightEar, (nose.0 - 0.05, nose.1 - 0.01));

        let sw = self.shoulder_half_width;
        let hw = self.hip_half_width;
        set(&mut pose, KeypointIndex::LeftShoulder, (shoulder.0 + sw, shoulder.1));
        set(&mut pose, KeypointIndex::RightShoulder, (shoulder.0 - sw, shoulder.1));
        set(&mut pose, KeypointIndex::LeftHip, (hip.0 + hw, hip.1));
        set(&mut pose, KeypointIndex::RightHip, (hip.0 - hw, hip.1));
        set(&mut pose, KeypointIndex::LeftKnee, (self.center_x + hw, self.knee_y));
        set(&mut pose, KeypointIndex::RightKnee, (self.center_x - hw, self.knee_y));
        set(&mut pose, KeypointIndex::LeftAnkle, (self.center_x + hw, self.ankle_y));
        set(&mut pose, KeypointIndex::RightAnkle, (self.center_x - hw, self.ankle_y));

        // 手首の高さと横位置
        let (wrist_y, wrist_half) = match posture {
            Posture::ArmsAt(level) => {
                let level = level.clamp(0.0, 1.0);
                let overhead_y = nose.1 - 0.2 * torso;
                if level <= SHOULDER_LEVEL {
                    let t = level / SHOULDER_LEVEL;
                    (hip.1 - t * (hip.1 - shoulder.1), 0.12 + 0.10 * t)
                } else {
                    let t = (level - SHOULDER_LEVEL) / (1.0 - SHOULDER_LEVEL);
                    (shoulder.1 - t * (shoulder.1 - overhead_y), 0.22 - 0.06 * t)
                }
            }
            _ => (hip.1, 0.12),
        };
        let left_wrist = (shoulder.0 + wrist_half, wrist_y);
        let right_wrist = (shoulder.0 - wrist_half, wrist_y);
        set(&mut pose, KeypointIndex::LeftWrist, left_wrist);
        set(&mut pose, KeypointIndex::RightWrist, right_wrist);
        set(
            &mut pose,
            KeypointIndex::LeftElbow,
            ((shoulder.0 + sw + left_wrist.0) / 2.0, (shoulder.1 + wrist_y) / 2.0),
        );
        set(
            &mut pose,
            KeypointIndex::RightElbow,
            ((shoulder.0 - sw + right_wrist.0) / 2.0, (shoulder.1 + wrist_y) / 2.0),
        );

        pose
    }

    /// 68-point face around the nose keypoint of `pose`
    pub fn face(&self, expression: Expression, pose: &Pose) -> FaceLandmarks {
        let nose = pose.get(KeypointIndex::Nose);
        face_landmarks(expression, (nose.x, nose.y), self.eye_span)
    }
}

/// Builds landmarks whose ratios match `expression` exactly.
fn face_landmarks(expression: Expression, nose: (f32, f32), span: f32) -> FaceLandmarks {
    let (ear, brow, mar, width) = expression.geometry();
    let mut points = [(0.0f32, 0.0f32); FACE_LANDMARK_COUNT];
    let (cx, ny) = nose;
    let eye_y = ny - 0.35 * span;
    let eye_w = span / 3.0;
    let eye_h = ear * eye_w;

    // 目: 外側/内側の角と上下2点ずつ
    let mut eye = |start: usize, x0: f32| {
        points[start] = (x0, eye_y);
        points[start + 1] = (x0 + eye_w / 3.0, eye_y - eye_h / 2.0);
        points[start + 2] = (x0 + 2.0 * eye_w / 3.0, eye_y - eye_h / 2.0);
        points[start + 3] = (x0 + eye_w, eye_y);
        points[start + 4] = (x0 + 2.0 * eye_w / 3.0, eye_y + eye_h / 2.0);
        points[start + 5] = (x0 + eye_w / 3.0, eye_y + eye_h / 2.0);
    };
    eye(36, cx - span / 2.0);
    eye(42, cx + span / 2.0 - eye_w);

    let brow_y = eye_y - brow * span;
    for i in 0..5 {
        let t = i as f32 / 4.0;
        points[17 + i] = (cx - span / 2.0 + t * eye_w, brow_y);
        points[22 + i] = (cx + span / 2.0 - eye_w + t * eye_w, brow_y);
    }

    for i in 0..9 {
        points[27 + i] = (cx, eye_y + (ny - eye_y) * i as f32 / 8.0);
    }

    let mouth_y = ny + 0.5 * span;
    let mouth_w = width * span;
    for i in 0..12 {
        let angle = i as f32 / 12.0 * std::f32::consts::TAU;
        points[48 + i] = (cx - mouth_w / 2.0 * angle.cos(), mouth_y - 0.1 * span * angle.sin());
    }
    let inner_w = 0.8 * mouth_w;
    let gap = mar * 2.0 * inner_w / 3.0;
    points[60] = (cx - inner_w / 2.0, mouth_y);
    points[64] = (cx + inner_w / 2.0, mouth_y);
    for (k, dx) in [-0.2f32, 0.0, 0.2].iter().enumerate() {
        points[61 + k] = (cx + dx * mouth_w, mouth_y - gap / 2.0);
        points[67 - k] = (cx + dx * mouth_w, mouth_y + gap / 2.0);
    }

    for i in 0..17 {
        let angle = std::f32::consts::PI * i as f32 / 16.0;
        points[i] = (cx - span * angle.cos(), eye_y + span * 1.2 * angle.sin());
    }

    FaceLandmarks::new(points)
}

/// One piece of a motion script
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Hold { posture: Posture, duration: Duration },
    Ramp { from: Posture, to: Posture, duration: Duration },
    /// Nobody in front of the camera
    Absent { duration: Duration },
}

/// Phase lengths of one scripted repetition
#[derive(Debug, Clone, Copy)]
pub struct RepTiming {
    pub rise: Duration,
    pub hold: Duration,
    pub fall: Duration,
    pub rest: Duration,
}

impl Default for RepTiming {
    fn default() -> Self {
        Self {
            rise: Duration::from_millis(600),
            hold: Duration::from_millis(500),
            fall: Duration::from_millis(600),
            rest: Duration::from_millis(800),
        }
    }
}

impl RepTiming {
    pub fn total(&self) -> Duration {
        self.rise + self.hold + self.fall + self.rest
    }
}

impl Segment {
    pub fn hold(posture: Posture, duration: Duration) -> Self {
        Segment::Hold { posture, duration }
    }

    /// Rise to `peak`, hold, return and rest
    pub fn rep(mode: ExerciseMode, peak: f32, timing: RepTiming) -> [Segment; 4] {
        let rest = Posture::for_mode(mode, 0.0);
        let top = Posture::for_mode(mode, peak);
        [
            Segment::Ramp { from: rest, to: top, duration: timing.rise },
            Segment::Hold { posture: top, duration: timing.hold },
            Segment::Ramp { from: top, to: rest, duration: timing.fall },
            Segment::Hold { posture: rest, duration: timing.rest },
        ]
    }

    pub fn duration(&self) -> Duration {
        match self {
            Segment::Hold { duration, .. } | Segment::Ramp { duration, .. } | Segment::Absent { duration } => *duration,
        }
    }

    fn sample(&self, t: f32) -> Option<Posture> {
        match *self {
            Segment::Hold { posture, .. } => Some(posture),
            Segment::Ramp { from, to, .. } => Some(from.lerp(to, t)),
            Segment::Absent { .. } => None,
        }
    }
}

/// What the scripted "camera" saw
#[derive(Debug, Clone, Default)]
pub struct SyntheticImage {
    pub pose: Option<Pose>,
    pub face: Option<FaceLandmarks>,
}

/// Plays segments at a fixed frame rate
pub struct ScriptedSource {
    figure: Figure,
    frame_interval: Duration,
    clock: Duration,
    segments: VecDeque<Segment>,
    segment_elapsed: Duration,
    expression: Option<Expression>,
    /// Posture shown once the script runs out (`None` ends the capture)
    idle: Option<Posture>,
    fail_at_frame: Option<u64>,
    frames: u64,
}

impl ScriptedSource {
    pub fn new(fps: u32) -> Self {
        Self {
            figure: Figure::default(),
            frame_interval: Duration::from_micros(1_000_000 / u64::from(fps.max(1))),
            clock: Duration::ZERO,
            segments: VecDeque::new(),
            segment_elapsed: Duration::ZERO,
            expression: None,
            idle: None,
            fail_at_frame: None,
            frames: 0,
        }
    }

    /// Keep standing in `posture` instead of ending when the script is empty
    pub fn idle_in(mut self, posture: Posture) -> Self {
        self.idle = Some(posture);
        self
    }

    /// Report a device failure on the given (0-based) frame
    pub fn fail_at(mut self, frame: u64) -> Self {
        self.fail_at_frame = Some(frame);
        self
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn set_expression(&mut self, expression: Option<Expression>) {
        self.expression = expression;
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push_back(segment);
    }

    pub fn extend(&mut self, segments: impl IntoIterator<Item = Segment>) {
        self.segments.extend(segments);
    }

    /// Time left in the queued script
    pub fn remaining(&self) -> Duration {
        let total: Duration = self.segments.iter().map(Segment::duration).sum();
        total.saturating_sub(self.segment_elapsed)
    }

    fn next_posture(&mut self) -> Option<Option<Posture>> {
        loop {
            let Some(segment) = self.segments.front() else {
                return self.idle.map(Some);
            };
            let duration = segment.duration();
            if self.segment_elapsed >= duration {
                self.segment_elapsed -= duration;
                self.segments.pop_front();
                continue;
            }
            let t = self.segment_elapsed.as_secs_f32() / duration.as_secs_f32();
            let posture = segment.sample(t);
            self.segment_elapsed += self.frame_interval;
            return Some(posture);
        }
    }
}

impl FrameSource for ScriptedSource {
    type Frame = SyntheticImage;

    fn capture(&mut self) -> Result<CapturedFrame<SyntheticImage>, SessionError> {
        if self.fail_at_frame == Some(self.frames) {
            return Err(SessionError::CaptureFailed("scripted device failure".to_string()));
        }
        let posture = self.next_posture().ok_or(SessionError::CaptureEnded)?;
        let pose = posture.map(|p| self.figure.pose(p));
        let face = match (&pose, self.expression) {
            (Some(pose), Some(expression)) => Some(self.figure.face(expression, pose)),
            _ => None,
        };
        let frame = CapturedFrame::new(SyntheticImage { pose, face }, self.clock);
        self.clock += self.frame_interval;
        self.frames += 1;
        Ok(frame)
    }
}

/// Reads the pose and face straight out of a `SyntheticImage`
pub struct SyntheticDetector {
    capability: FaceCapability,
}

impl SyntheticDetector {
    pub fn new(capability: FaceCapability) -> Self {
        Self { capability }
    }

    pub fn with_face() -> Self {
        Self::new(FaceCapability::Available)
    }

    pub fn without_face() -> Self {
        Self::new(FaceCapability::Unavailable {
            reason: "no face model in synthetic mode".to_string(),
        })
    }
}

impl KeypointSource<SyntheticImage> for SyntheticDetector {
    fn detect_pose(&mut self, frame: &CapturedFrame<SyntheticImage>) -> anyhow::Result<PoseFrame> {
        Ok(match &frame.image.pose {
            Some(pose) => PoseFrame::new(pose.sanitized(), frame.timestamp),
            None => PoseFrame::absent(frame.timestamp),
        })
    }

    fn detect_face(
        &mut self,
        frame: &CapturedFrame<SyntheticImage>,
        _pose: &PoseFrame,
    ) -> anyhow::Result<Option<FaceLandmarks>> {
        Ok(frame.image.face.clone())
    }

    fn face_capability(&self) -> &FaceCapability {
        &self.capability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_follow_frame_rate() {
        let mut source = ScriptedSource::new(25);
        source.push(Segment::hold(Posture::STANDING, Duration::from_millis(200)));
        let stamps: Vec<Duration> = std::iter::from_fn(|| source.capture().ok())
            .map(|f| f.timestamp)
            .collect();
        assert_eq!(stamps.len(), 5);
        assert_eq!(stamps[1], Duration::from_millis(40));
        assert_eq!(stamps[4], Duration::from_millis(160));
    }

    #[test]
    fn test_script_end_and_idle() {
        let mut source = ScriptedSource::new(10);
        source.push(Segment::hold(Posture::STANDING, Duration::from_millis(100)));
        assert!(source.capture().is_ok());
        assert!(matches!(source.capture(), Err(SessionError::CaptureEnded)));

        let mut source = ScriptedSource::new(10).idle_in(Posture::STANDING);
        for _ in 0..5 {
            assert!(source.capture().unwrap().image.pose.is_some());
        }
    }

    #[test]
    fn test_absent_segment() {
        let mut source = ScriptedSource::new(10);
        source.set_expression(Some(Expression::Smile));
        source.push(Segment::Absent { duration: Duration::from_millis(100) });
        let frame = source.capture().unwrap();
        assert!(frame.image.pose.is_none());
        assert!(frame.image.face.is_none());
    }

    #[test]
    fn test_ramp_interpolates() {
        let mut source = ScriptedSource::new(10);
        source.push(Segment::Ramp {
            from: Posture::ArmsAt(0.0),
            to: Posture::ArmsAt(1.0),
            duration: Duration::from_millis(1000),
        });
        let figure = Figure::default();
        let mid = std::iter::from_fn(|| source.capture().ok()).nth(5).unwrap();
        assert_eq!(mid.image.pose.unwrap(), figure.pose(Posture::ArmsAt(0.5)));
    }

    #[test]
    fn test_fail_at() {
        let mut source = ScriptedSource::new(10).idle_in(Posture::STANDING).fail_at(2);
        assert!(source.capture().is_ok());
        assert!(source.capture().is_ok());
        assert!(matches!(source.capture(), Err(SessionError::CaptureFailed(_))));
    }

    #[test]
    fn test_figure_is_inside_frame() {
        let figure = Figure::default();
        for posture in [Posture::ArmsAt(1.0), Posture::Lean(-45.0), Posture::Lean(45.0), Posture::Squat(1.0)] {
            let pose = figure.pose(posture);
            assert_eq!(pose.sanitized(), pose, "{:?} touches the border", posture);
        }
    }

    #[test]
    fn test_detector_capability() {
        assert!(SyntheticDetector::with_face().face_capability().is_available());
        assert!(!SyntheticDetector::without_face().face_capability().is_available());
    }
}
