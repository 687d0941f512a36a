#[cfg(feature = "desktop")]
use anyhow::Result;
#[cfg(feature = "desktop")]
use opencv::{
    core::{Mat, Rect},
    prelude::*,
};

use super::face::{FaceLandmarks, FACE_LANDMARK_COUNT};
use super::keypoint::{KeypointIndex, PoseFrame};

/// クロップ領域（正規化座標 0.0〜1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRegion {
    pub fn full() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.width >= 1.0 && self.height >= 1.0
    }

    /// クロップ内の正規化座標 → フレーム全体の正規化座標
    pub fn to_frame(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (self.x + x * self.width, self.y + y * self.height)
    }
}

/// BBox（ピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// 頭部のキーポイント
const HEAD: [KeypointIndex; 5] = [
    KeypointIndex::Nose,
    KeypointIndex::LeftEye,
    KeypointIndex::RightEye,
    KeypointIndex::LeftEar,
    KeypointIndex::RightEar,
];

/// 頭部キーポイントから顔の正方形BBoxを推定
///
/// 鼻と両目が必須。辺の長さは頭部キーポイントの横幅の `scale` 倍。
pub fn face_bbox_from_pose(frame: &PoseFrame, frame_w: u32, frame_h: u32, floor: f32, scale: f32) -> Option<BBox> {
    if !frame.has_all(&HEAD[..3], floor) {
        return None;
    }
    let (fw, fh) = (frame_w as f32, frame_h as f32);
    let points: Vec<(f32, f32)> = HEAD
        .iter()
        .filter_map(|&i| frame.point(i, floor))
        .map(|kp| (kp.x * fw, kp.y * fh))
        .collect();

    let min_x = points.iter().map(|p| p.0).fold(f32::MAX, f32::min);
    let max_x = points.iter().map(|p| p.0).fold(f32::MIN, f32::max);
    let nose = frame.point(KeypointIndex::Nose, floor)?;
    let side = (max_x - min_x) * scale;
    if side < 2.0 {
        return None;
    }
    let (cx, cy) = ((min_x + max_x) / 2.0, nose.y * fh);

    Some(BBox {
        x: cx - side / 2.0,
        y: cy - side / 2.0,
        width: side,
        height: side,
    })
}

/// BBoxをフレーム境界にクリップした正規化領域（空なら None）
pub fn clip_to_frame(bbox: &BBox, frame_w: u32, frame_h: u32) -> Option<CropRegion> {
    let (fw, fh) = (frame_w as f32, frame_h as f32);
    let x0 = bbox.x.max(0.0);
    let y0 = bbox.y.max(0.0);
    let x1 = (bbox.x + bbox.width).min(fw);
    let y1 = (bbox.y + bbox.height).min(fh);
    if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
        return None;
    }
    Some(CropRegion {
        x: x0 / fw,
        y: y0 / fh,
        width: (x1 - x0) / fw,
        height: (y1 - y0) / fh,
    })
}

/// 顔モデル出力（クロップ内の正規化座標）をフレーム全体の正規化座標に変換
pub fn remap_landmarks(face: &FaceLandmarks, crop: &CropRegion) -> FaceLandmarks {
    let points: [(f32, f32); FACE_LANDMARK_COUNT] = std::array::from_fn(|i| crop.to_frame(face.point(i)));
    FaceLandmarks::new(points)
}

/// 正規化領域でフレームを切り出す
#[cfg(feature = "desktop")]
pub fn crop_mat(frame: &Mat, region: &CropRegion) -> Result<Mat> {
    let fw = frame.cols() as f32;
    let fh = frame.rows() as f32;
    let rx = (region.x * fw) as i32;
    let ry = (region.y * fh) as i32;
    let rw = ((region.width * fw) as i32).clamp(1, frame.cols() - rx);
    let rh = ((region.height * fh) as i32).clamp(1, frame.rows() - ry);

    let roi = Rect::new(rx, ry, rw, rh);
    let cropped = Mat::roi(frame, roi)?;
    Ok(cropped.try_clone()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::keypoint::{Keypoint, Pose};
    use std::time::Duration;

    fn head(nose: (f32, f32), conf: f32) -> PoseFrame {
        let mut pose = Pose::empty();
        pose.set(KeypointIndex::Nose, Keypoint::new(nose.0, nose.1, conf));
        pose.set(KeypointIndex::LeftEye, Keypoint::new(nose.0 + 0.02, nose.1 - 0.02, conf));
        pose.set(KeypointIndex::RightEye, Keypoint::new(nose.0 - 0.02, nose.1 - 0.02, conf));
        pose.set(KeypointIndex::LeftEar, Keypoint::new(nose.0 + 0.05, nose.1, conf));
        pose.set(KeypointIndex::RightEar, Keypoint::new(nose.0 - 0.05, nose.1, conf));
        PoseFrame::new(pose, Duration::ZERO)
    }

    #[test]
    fn test_crop_region_full() {
        let region = CropRegion::full();
        assert!(region.is_full());
        assert_eq!(region.to_frame((0.5, 0.5)), (0.5, 0.5));
    }

    #[test]
    fn test_face_bbox_is_square_around_head() {
        let bbox = face_bbox_from_pose(&head((0.5, 0.25), 0.9), 1000, 1000, 0.3, 2.0).unwrap();
        // 耳の間 0.1 * 1000 = 100px → 200px
        assert!((bbox.width - 200.0).abs() < 1e-3);
        assert_eq!(bbox.width, bbox.height);
        assert!((bbox.x - 400.0).abs() < 1e-3);
        assert!((bbox.y - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_face_bbox_needs_nose_and_eyes() {
        let mut frame = head((0.5, 0.25), 0.9);
        frame.pose.set(KeypointIndex::LeftEye, Keypoint::new(0.52, 0.23, 0.1));
        assert!(face_bbox_from_pose(&frame, 640, 480, 0.3, 2.0).is_none());
        assert!(face_bbox_from_pose(&PoseFrame::absent(Duration::ZERO), 640, 480, 0.3, 2.0).is_none());
    }

    #[test]
    fn test_clip_to_frame() {
        let bbox = BBox { x: -50.0, y: 100.0, width: 200.0, height: 200.0 };
        let region = clip_to_frame(&bbox, 1000, 500).unwrap();
        assert_eq!(region.x, 0.0);
        assert!((region.width - 0.15).abs() < 1e-6);
        assert!((region.y - 0.2).abs() < 1e-6);

        let outside = BBox { x: 1200.0, y: 0.0, width: 100.0, height: 100.0 };
        assert!(clip_to_frame(&outside, 1000, 500).is_none());
    }

    #[test]
    fn test_remap_landmarks() {
        let crop = CropRegion {
            x: 0.25,
            y: 0.1,
            width: 0.5,
            height: 0.8,
        };
        let face = FaceLandmarks::new([(0.5, 0.5); FACE_LANDMARK_COUNT]);
        let remapped = remap_landmarks(&face, &crop);
        let (x, y) = remapped.point(30);
        // 0.25 + 0.5 * 0.5 = 0.5, 0.1 + 0.5 * 0.8 = 0.5
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 0.5).abs() < 1e-6);
    }
}
