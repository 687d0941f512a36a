use std::time::Duration;

/// MoveNet / COCO の 17 キーポイントインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointIndex; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 四肢（画像端でゴーストになりやすい部位）
    fn is_limb(self) -> bool {
        use KeypointIndex::*;
        matches!(
            self,
            LeftElbow | RightElbow | LeftWrist | RightWrist | LeftKnee | RightKnee | LeftAnkle | RightAnkle
        )
    }
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0, 下が正)
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// ピクセル座標に変換
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            confidence: 0.0,
        }
    }
}

/// 17キーポイントからなる姿勢
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    /// 人物未検出を表す空の姿勢（全キーポイント信頼度0）
    pub fn empty() -> Self {
        Self::default()
    }

    /// インデックスでキーポイントを取得
    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    pub fn set(&mut self, index: KeypointIndex, keypoint: Keypoint) {
        self.keypoints[index as usize] = keypoint;
    }

    /// 名前付きで全キーポイントを列挙
    pub fn iter_named(&self) -> impl Iterator<Item = (KeypointIndex, &Keypoint)> {
        KeypointIndex::ALL.iter().copied().zip(self.keypoints.iter())
    }

    /// 全キーポイントの平均信頼度
    pub fn average_confidence(&self) -> f32 {
        let sum: f32 = self.keypoints.iter().map(|k| k.confidence).sum();
        sum / KeypointIndex::COUNT as f32
    }

    /// 画像端に張り付いた四肢キーポイントを無効化したPoseを返す
    /// 画像端ではモデルの受容野が切れるため位置が不正確
    /// 体幹（肩・腰）と顔は対象外
    pub fn sanitized(&self) -> Pose {
        let mut sanitized = self.clone();
        for (index, kp) in KeypointIndex::ALL.iter().zip(sanitized.keypoints.iter_mut()) {
            if index.is_limb() && (kp.x <= 0.02 || kp.x >= 0.98 || kp.y <= 0.02 || kp.y >= 0.98) {
                kp.confidence = 0.0;
            }
        }
        sanitized
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}

/// タイムスタンプ付きの1フレーム分の姿勢
///
/// `timestamp` はセッション開始からの単調増加時間。
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    pub pose: Pose,
    pub timestamp: Duration,
}

impl PoseFrame {
    pub fn new(pose: Pose, timestamp: Duration) -> Self {
        Self { pose, timestamp }
    }

    pub fn absent(timestamp: Duration) -> Self {
        Self::new(Pose::empty(), timestamp)
    }

    /// 信頼度が下限未満のキーポイントは「ゼロ」ではなく「不在」として扱う
    pub fn point(&self, index: KeypointIndex, floor: f32) -> Option<&Keypoint> {
        let kp = self.pose.get(index);
        kp.is_valid(floor).then_some(kp)
    }

    /// 指定キーポイントがすべて下限以上か
    pub fn has_all(&self, indices: &[KeypointIndex], floor: f32) -> bool {
        indices.iter().all(|&i| self.point(i, floor).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_index_count() {
        assert_eq!(KeypointIndex::COUNT, 17);
        assert_eq!(KeypointIndex::ALL.len(), KeypointIndex::COUNT);
    }

    #[test]
    fn test_keypoint_index_from_index() {
        assert_eq!(KeypointIndex::from_index(0), Some(KeypointIndex::Nose));
        assert_eq!(KeypointIndex::from_index(16), Some(KeypointIndex::RightAnkle));
        assert_eq!(KeypointIndex::from_index(17), None);
        for (i, idx) in KeypointIndex::ALL.iter().enumerate() {
            assert_eq!(*idx as usize, i);
        }
    }

    #[test]
    fn test_keypoint_is_valid() {
        let kp = Keypoint::new(0.5, 0.5, 0.7);
        assert!(kp.is_valid(0.5));
        assert!(!kp.is_valid(0.8));
    }

    #[test]
    fn test_keypoint_to_pixel() {
        let kp = Keypoint::new(0.5, 0.25, 1.0);
        let (px, py) = kp.to_pixel(640, 480);
        assert_eq!(px, 320);
        assert_eq!(py, 120);
    }

    #[test]
    fn test_pose_get_set() {
        let mut pose = Pose::empty();
        pose.set(KeypointIndex::Nose, Keypoint::new(0.5, 0.3, 0.9));
        let nose = pose.get(KeypointIndex::Nose);
        assert_eq!(nose.x, 0.5);
        assert_eq!(nose.y, 0.3);
        assert_eq!(nose.confidence, 0.9);
    }

    #[test]
    fn test_pose_average_confidence() {
        let keypoints = [Keypoint::new(0.0, 0.0, 0.5); KeypointIndex::COUNT];
        let pose = Pose::new(keypoints);
        assert!((pose.average_confidence() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_low_confidence_point_is_absent() {
        let mut pose = Pose::empty();
        pose.set(KeypointIndex::LeftWrist, Keypoint::new(0.4, 0.4, 0.1));
        pose.set(KeypointIndex::RightWrist, Keypoint::new(0.6, 0.4, 0.8));
        let frame = PoseFrame::new(pose, Duration::ZERO);
        assert!(frame.point(KeypointIndex::LeftWrist, 0.3).is_none());
        assert!(frame.point(KeypointIndex::RightWrist, 0.3).is_some());
        assert!(!frame.has_all(&[KeypointIndex::LeftWrist, KeypointIndex::RightWrist], 0.3));
    }

    #[test]
    fn test_sanitized_drops_border_limbs_only() {
        let mut pose = Pose::empty();
        pose.set(KeypointIndex::LeftWrist, Keypoint::new(0.99, 0.5, 0.9));
        pose.set(KeypointIndex::LeftShoulder, Keypoint::new(0.99, 0.5, 0.9));
        pose.set(KeypointIndex::RightWrist, Keypoint::new(0.5, 0.5, 0.9));
        let sanitized = pose.sanitized();
        assert_eq!(sanitized.get(KeypointIndex::LeftWrist).confidence, 0.0);
        assert_eq!(sanitized.get(KeypointIndex::LeftShoulder).confidence, 0.9);
        assert_eq!(sanitized.get(KeypointIndex::RightWrist).confidence, 0.9);
    }
}
