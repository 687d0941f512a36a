//! 姿勢から運動ごとのスカラー信号を取り出す
//!
//! 信号はすべて 0.0（安静）〜1.0（最大努力）。必要なキーポイントが
//! 一つでも欠けていれば `None`（＝このフレームは観測なし）。

use crate::pose::{KeypointIndex, PoseFrame};

use super::ExerciseMode;

/// 腕上げで肩の高さに相当する信号レベル（5段階中の3）
pub const SHOULDER_LEVEL: f32 = 0.6;
/// 頭上ラインは鼻から胴の長さのこの割合だけ上
const OVERHEAD_MARGIN: f32 = 0.2;
/// 側屈で 1.0 とする傾き角
pub const MAX_LEAN_DEG: f32 = 45.0;
const MIN_SEGMENT: f32 = 1e-3;

const ARM_RAISE_POINTS: &[KeypointIndex] = &[
    KeypointIndex::Nose,
    KeypointIndex::LeftShoulder,
    KeypointIndex::RightShoulder,
    KeypointIndex::LeftHip,
    KeypointIndex::RightHip,
    KeypointIndex::LeftWrist,
    KeypointIndex::RightWrist,
];

const TORSO_POINTS: &[KeypointIndex] = &[
    KeypointIndex::LeftShoulder,
    KeypointIndex::RightShoulder,
    KeypointIndex::LeftHip,
    KeypointIndex::RightHip,
];

const SQUAT_POINTS: &[KeypointIndex] = &[
    KeypointIndex::LeftShoulder,
    KeypointIndex::RightShoulder,
    KeypointIndex::LeftHip,
    KeypointIndex::RightHip,
    KeypointIndex::LeftKnee,
    KeypointIndex::RightKnee,
];

/// 各モードの信号に必要なキーポイント
pub fn required_keypoints(mode: ExerciseMode) -> &'static [KeypointIndex] {
    match mode {
        ExerciseMode::ArmRaise => ARM_RAISE_POINTS,
        ExerciseMode::SideStretch => TORSO_POINTS,
        ExerciseMode::ChairSquat => SQUAT_POINTS,
    }
}

/// 肩中心と腰中心（正規化座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Torso {
    pub shoulder_center: (f32, f32),
    pub hip_center: (f32, f32),
}

impl Torso {
    pub fn from_frame(frame: &PoseFrame, floor: f32) -> Option<Self> {
        Some(Self {
            shoulder_center: midpoint(frame, KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder, floor)?,
            hip_center: midpoint(frame, KeypointIndex::LeftHip, KeypointIndex::RightHip, floor)?,
        })
    }

    /// 腰から肩までの縦方向の長さ（上向きが正）
    pub fn height(&self) -> f32 {
        self.hip_center.1 - self.shoulder_center.1
    }

    /// 腰→肩ベクトルと鉛直上向きのなす角（度, 0〜180）
    pub fn lean_deg(&self) -> Option<f32> {
        let dx = self.shoulder_center.0 - self.hip_center.0;
        let up = self.hip_center.1 - self.shoulder_center.1;
        if dx.abs() < MIN_SEGMENT && up.abs() < MIN_SEGMENT {
            return None;
        }
        Some(dx.atan2(up).abs().to_degrees())
    }
}

/// 2点の中点。どちらかが不在なら `None`
pub fn midpoint(frame: &PoseFrame, a: KeypointIndex, b: KeypointIndex, floor: f32) -> Option<(f32, f32)> {
    let a = frame.point(a, floor)?;
    let b = frame.point(b, floor)?;
    Some(((a.x + b.x) / 2.0, (a.y + b.y) / 2.0))
}

/// 指定モードの信号を取り出す
pub fn extract(mode: ExerciseMode, frame: &PoseFrame, floor: f32) -> Option<f32> {
    if !frame.has_all(required_keypoints(mode), floor) {
        return None;
    }
    match mode {
        ExerciseMode::ArmRaise => arm_raise_level(frame, floor),
        ExerciseMode::SideStretch => side_lean(frame, floor),
        ExerciseMode::ChairSquat => squat_depth(frame, floor),
    }
}

/// 腕上げレベル
///
/// 腰→肩で 0.0〜0.6、肩→頭上で 0.6〜1.0。高齢者向けに肩までを
/// 緩やかにしてある。
fn arm_raise_level(frame: &PoseFrame, floor: f32) -> Option<f32> {
    let torso = Torso::from_frame(frame, floor)?;
    let wrist_y = midpoint(frame, KeypointIndex::LeftWrist, KeypointIndex::RightWrist, floor)?.1;
    let nose_y = frame.point(KeypointIndex::Nose, floor)?.y;

    let hips_y = torso.hip_center.1;
    let shoulders_y = torso.shoulder_center.1;
    let overhead_y = nose_y - OVERHEAD_MARGIN * torso.height().abs();

    // 前屈みなど幾何が崩れたときは腰→頭上の単一比率
    if hips_y <= shoulders_y || shoulders_y <= overhead_y {
        let full_range = hips_y - overhead_y;
        if full_range <= MIN_SEGMENT {
            return Some(0.0);
        }
        return Some(((hips_y - wrist_y) / full_range).clamp(0.0, 1.0));
    }

    let level = if wrist_y >= shoulders_y {
        let ratio = (hips_y - wrist_y) / (hips_y - shoulders_y);
        SHOULDER_LEVEL * ratio.clamp(0.0, 1.0)
    } else {
        let ratio = (shoulders_y - wrist_y) / (shoulders_y - overhead_y);
        SHOULDER_LEVEL + (1.0 - SHOULDER_LEVEL) * ratio.clamp(0.0, 1.0)
    };
    Some(level)
}

/// 側屈角 / 45°
fn side_lean(frame: &PoseFrame, floor: f32) -> Option<f32> {
    let lean = Torso::from_frame(frame, floor)?.lean_deg()?;
    Some((lean / MAX_LEAN_DEG).clamp(0.0, 1.0))
}

/// スクワットの深さ: 1 − (膝y − 腰y) / 胴の長さ
fn squat_depth(frame: &PoseFrame, floor: f32) -> Option<f32> {
    let torso = Torso::from_frame(frame, floor)?;
    let knee_y = midpoint(frame, KeypointIndex::LeftKnee, KeypointIndex::RightKnee, floor)?.1;
    let torso_len = torso.height();
    if torso_len <= MIN_SEGMENT {
        return None;
    }
    Some((1.0 - (knee_y - torso.hip_center.1) / torso_len).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::synthetic::{Figure, Posture};
    use std::time::Duration;

    const FLOOR: f32 = 0.3;

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    fn frame(posture: Posture) -> PoseFrame {
        PoseFrame::new(Figure::default().pose(posture), Duration::ZERO)
    }

    #[test]
    fn test_arm_raise_levels() {
        let rest = extract(ExerciseMode::ArmRaise, &frame(Posture::ArmsAt(0.0)), FLOOR).unwrap();
        let shoulder = extract(ExerciseMode::ArmRaise, &frame(Posture::ArmsAt(SHOULDER_LEVEL)), FLOOR).unwrap();
        let overhead = extract(ExerciseMode::ArmRaise, &frame(Posture::ArmsAt(1.0)), FLOOR).unwrap();
        assert!(approx_eq(rest, 0.0, 1e-3), "rest={}", rest);
        assert!(approx_eq(shoulder, SHOULDER_LEVEL, 1e-3), "shoulder={}", shoulder);
        assert!(approx_eq(overhead, 1.0, 1e-3), "overhead={}", overhead);
    }

    #[test]
    fn test_arm_raise_monotonic() {
        let mut prev = -1.0;
        for i in 0..=10 {
            let level = i as f32 / 10.0;
            let s = extract(ExerciseMode::ArmRaise, &frame(Posture::ArmsAt(level)), FLOOR).unwrap();
            assert!(s >= prev, "level {} gave {} after {}", level, s, prev);
            prev = s;
        }
    }

    #[test]
    fn test_side_lean() {
        let upright = extract(ExerciseMode::SideStretch, &frame(Posture::Lean(0.0)), FLOOR).unwrap();
        let fifteen = extract(ExerciseMode::SideStretch, &frame(Posture::Lean(15.0)), FLOOR).unwrap();
        let left = extract(ExerciseMode::SideStretch, &frame(Posture::Lean(-30.0)), FLOOR).unwrap();
        assert!(approx_eq(upright, 0.0, 1e-3));
        assert!(approx_eq(fifteen, 15.0 / 45.0, 1e-3), "fifteen={}", fifteen);
        assert!(approx_eq(left, 30.0 / 45.0, 1e-3), "left={}", left);
    }

    #[test]
    fn test_squat_depth() {
        let standing = extract(ExerciseMode::ChairSquat, &frame(Posture::Squat(0.0)), FLOOR).unwrap();
        let deep = extract(ExerciseMode::ChairSquat, &frame(Posture::Squat(0.8)), FLOOR).unwrap();
        assert!(standing < 0.05, "standing={}", standing);
        assert!(approx_eq(deep, 0.8, 1e-3), "deep={}", deep);
    }

    #[test]
    fn test_missing_keypoint_is_absent() {
        let mut f = frame(Posture::ArmsAt(0.5));
        let mut wrist = *f.pose.get(KeypointIndex::LeftWrist);
        wrist.confidence = 0.1;
        f.pose.set(KeypointIndex::LeftWrist, wrist);
        assert_eq!(extract(ExerciseMode::ArmRaise, &f, FLOOR), None);
        // 側屈は手首を使わない
        assert!(extract(ExerciseMode::SideStretch, &f, FLOOR).is_some());
    }

    #[test]
    fn test_empty_pose_is_absent() {
        let f = PoseFrame::absent(Duration::ZERO);
        for mode in ExerciseMode::ALL {
            assert_eq!(extract(mode, &f, FLOOR), None);
        }
    }
}
