//! 高齢者向けのフォームチェック
//!
//! 毎フレームではなく `check_interval_ms` ごとに判定する。

use std::time::Duration;

use crate::config::FormConfig;
use crate::pose::{KeypointIndex, PoseFrame};

use super::signal::{midpoint, Torso};
use super::ExerciseMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormIssue {
    ShouldersUneven,
    HeadMisaligned,
    /// 腕を真上まで上げすぎ
    ShoulderStrain,
    HipsUneven,
    KneesOverToes,
    OffBalance,
    BackTilted,
}

impl FormIssue {
    pub fn message(self) -> &'static str {
        match self {
            FormIssue::ShouldersUneven => "Keep shoulders level",
            FormIssue::HeadMisaligned => "Align head with shoulders",
            FormIssue::ShoulderStrain => "Avoid full overhead - protect your shoulders",
            FormIssue::HipsUneven => "Keep hips stable",
            FormIssue::KneesOverToes => "Keep knees behind toes",
            FormIssue::OffBalance => "Maintain balance - keep your weight centred",
            FormIssue::BackTilted => "Keep back straight",
        }
    }

    /// 怪我につながる問題か（姿勢の乱れより優先）
    pub fn is_injury_risk(self) -> bool {
        matches!(self, FormIssue::ShoulderStrain | FormIssue::KneesOverToes)
    }
}

pub struct FormChecker {
    config: FormConfig,
    floor: f32,
    last_check: Option<Duration>,
}

impl FormChecker {
    pub fn new(config: FormConfig, floor: f32) -> Self {
        Self {
            config,
            floor,
            last_check: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_check = None;
    }

    /// 判定間隔が来ていればチェックする。間隔内なら `None`
    ///
    /// 人物がいないフレームでは間隔を消費しない。
    pub fn check(&mut self, frame: &PoseFrame, mode: ExerciseMode) -> Option<Vec<FormIssue>> {
        let interval = Duration::from_millis(self.config.check_interval_ms);
        if let Some(last) = self.last_check {
            if frame.timestamp.saturating_sub(last) < interval {
                return None;
            }
        }
        let torso = Torso::from_frame(frame, self.floor)?;
        self.last_check = Some(frame.timestamp);

        let mut issues = match mode {
            ExerciseMode::ArmRaise => self.arm_raise(frame, &torso),
            ExerciseMode::SideStretch => self.side_stretch(frame),
            ExerciseMode::ChairSquat => self.chair_squat(frame, &torso),
        };
        // 怪我のリスクを先頭に
        issues.sort_by_key(|issue| !issue.is_injury_risk());
        Some(issues)
    }

    fn arm_raise(&self, frame: &PoseFrame, torso: &Torso) -> Vec<FormIssue> {
        let mut issues = Vec::new();
        if let Some(dev) = self.level_deviation(frame, KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder) {
            if dev > self.config.shoulder_level_tolerance {
                issues.push(FormIssue::ShouldersUneven);
            }
        }
        if let Some(nose) = frame.point(KeypointIndex::Nose, self.floor) {
            if (nose.x - torso.shoulder_center.0).abs() > self.config.head_alignment_tolerance {
                issues.push(FormIssue::HeadMisaligned);
            }
        }
        if self.shoulder_strain(frame, torso) {
            issues.push(FormIssue::ShoulderStrain);
        }
        issues
    }

    /// 手首が肩より十分高く、腕の挙上角が危険域を超えている
    fn shoulder_strain(&self, frame: &PoseFrame, torso: &Torso) -> bool {
        let Some((_, wrist_y)) = midpoint(frame, KeypointIndex::LeftWrist, KeypointIndex::RightWrist, self.floor) else {
            return false;
        };
        if wrist_y > torso.shoulder_center.1 - self.config.shoulder_strain_lift {
            return false;
        }
        let arms = [
            (KeypointIndex::LeftShoulder, KeypointIndex::LeftWrist),
            (KeypointIndex::RightShoulder, KeypointIndex::RightWrist),
        ];
        arms.iter().any(|&(s, w)| {
            match (frame.point(s, self.floor), frame.point(w, self.floor)) {
                (Some(s), Some(w)) => {
                    // 腕を下ろした状態が 0°、真上が 180°
                    let from_up = (w.x - s.x).atan2(s.y - w.y).abs().to_degrees();
                    180.0 - from_up > self.config.shoulder_pain_zone_deg
                }
                _ => false,
            }
        })
    }

    fn side_stretch(&self, frame: &PoseFrame) -> Vec<FormIssue> {
        match self.level_deviation(frame, KeypointIndex::LeftHip, KeypointIndex::RightHip) {
            Some(dev) if dev > self.config.hip_level_tolerance => vec![FormIssue::HipsUneven],
            _ => Vec::new(),
        }
    }

    fn chair_squat(&self, frame: &PoseFrame, torso: &Torso) -> Vec<FormIssue> {
        let mut issues = Vec::new();
        let knees = [
            (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
            (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
        ];
        let knees_forward = knees.iter().any(|&(k, a)| {
            match (frame.point(k, self.floor), frame.point(a, self.floor)) {
                (Some(k), Some(a)) => (k.x - a.x).abs() > self.config.knee_alignment_tolerance,
                _ => false,
            }
        });
        if knees_forward {
            issues.push(FormIssue::KneesOverToes);
        }
        if (torso.shoulder_center.0 - torso.hip_center.0).abs() > self.config.balance_tolerance {
            issues.push(FormIssue::OffBalance);
        }
        if torso.lean_deg().is_some_and(|deg| deg > self.config.back_tilt_max_deg) {
            issues.push(FormIssue::BackTilted);
        }
        issues
    }

    fn level_deviation(&self, frame: &PoseFrame, a: KeypointIndex, b: KeypointIndex) -> Option<f32> {
        let a = frame.point(a, self.floor)?;
        let b = frame.point(b, self.floor)?;
        Some((a.y - b.y).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::synthetic::{Figure, Posture};
    use crate::pose::Keypoint;

    const FLOOR: f32 = 0.3;

    fn frame_at(posture: Posture, ms: u64) -> PoseFrame {
        PoseFrame::new(Figure::default().pose(posture), Duration::from_millis(ms))
    }

    fn checker() -> FormChecker {
        FormChecker::new(FormConfig::default(), FLOOR)
    }

    #[test]
    fn test_good_form_has_no_issues() {
        let mut c = checker();
        assert_eq!(c.check(&frame_at(Posture::ArmsAt(0.6), 0), ExerciseMode::ArmRaise), Some(vec![]));
        c.reset();
        assert_eq!(c.check(&frame_at(Posture::Lean(30.0), 0), ExerciseMode::SideStretch), Some(vec![]));
        c.reset();
        assert_eq!(c.check(&frame_at(Posture::Squat(0.8), 0), ExerciseMode::ChairSquat), Some(vec![]));
    }

    #[test]
    fn test_rate_limited() {
        let mut c = checker();
        assert!(c.check(&frame_at(Posture::STANDING, 0), ExerciseMode::ArmRaise).is_some());
        assert!(c.check(&frame_at(Posture::STANDING, 1_000), ExerciseMode::ArmRaise).is_none());
        assert!(c.check(&frame_at(Posture::STANDING, 2_000), ExerciseMode::ArmRaise).is_some());
    }

    #[test]
    fn test_absent_pose_does_not_consume_interval() {
        let mut c = checker();
        assert!(c.check(&PoseFrame::absent(Duration::ZERO), ExerciseMode::ArmRaise).is_none());
        assert!(c.check(&frame_at(Posture::STANDING, 10), ExerciseMode::ArmRaise).is_some());
    }

    #[test]
    fn test_full_overhead_strains_shoulders() {
        let mut c = checker();
        let issues = c.check(&frame_at(Posture::ArmsAt(1.0), 0), ExerciseMode::ArmRaise).unwrap();
        assert_eq!(issues, vec![FormIssue::ShoulderStrain]);
    }

    #[test]
    fn test_uneven_shoulders_and_head() {
        let mut frame = frame_at(Posture::STANDING, 0);
        let ls = *frame.pose.get(KeypointIndex::LeftShoulder);
        frame.pose.set(KeypointIndex::LeftShoulder, Keypoint::new(ls.x, ls.y + 0.08, ls.confidence));
        let nose = *frame.pose.get(KeypointIndex::Nose);
        frame.pose.set(KeypointIndex::Nose, Keypoint::new(nose.x + 0.1, nose.y, nose.confidence));
        let issues = checker().check(&frame, ExerciseMode::ArmRaise).unwrap();
        assert_eq!(issues, vec![FormIssue::ShouldersUneven, FormIssue::HeadMisaligned]);
    }

    #[test]
    fn test_squat_lean_is_off_balance_and_tilted() {
        let issues = checker().check(&frame_at(Posture::Lean(40.0), 0), ExerciseMode::ChairSquat).unwrap();
        assert!(issues.contains(&FormIssue::OffBalance));
        assert!(issues.contains(&FormIssue::BackTilted));
    }

    #[test]
    fn test_injury_risk_sorted_first() {
        let mut frame = frame_at(Posture::Lean(40.0), 0);
        let knee = *frame.pose.get(KeypointIndex::LeftKnee);
        frame.pose.set(KeypointIndex::LeftKnee, Keypoint::new(knee.x + 0.1, knee.y, knee.confidence));
        let issues = checker().check(&frame, ExerciseMode::ChairSquat).unwrap();
        assert_eq!(issues[0], FormIssue::KneesOverToes);
    }
}
