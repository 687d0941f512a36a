//! 68点ランドマークからの顔の幾何特徴

use crate::pose::face::{FaceLandmarks, INNER_LIPS, LEFT_BROW, LEFT_EYE, RIGHT_BROW, RIGHT_EYE};

/// 両目外側の角（距離の正規化に使う）
const RIGHT_EYE_OUTER: usize = 36;
const LEFT_EYE_OUTER: usize = 45;
const MOUTH_LEFT: usize = 48;
const MOUTH_RIGHT: usize = 54;

/// 顔の大きさに依存しない特徴量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceGeometry {
    /// 目の開き (EAR, 両目平均)
    pub eye_aperture: f32,
    /// 口の開き (内唇 MAR)
    pub mouth_aperture: f32,
    /// 眉と目の縦距離 / 両目外側の距離
    pub brow_height: f32,
    /// 口角間の距離 / 両目外側の距離
    pub mouth_width: f32,
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn mean_y(points: &[(f32, f32)]) -> f32 {
    points.iter().map(|p| p.1).sum::<f32>() / points.len() as f32
}

/// EAR = (|p1-p5| + |p2-p4|) / (2 * |p0-p3|)
fn eye_aspect_ratio(eye: &[(f32, f32)]) -> Option<f32> {
    let width = distance(eye[0], eye[3]);
    if width <= f32::EPSILON {
        return None;
    }
    Some((distance(eye[1], eye[5]) + distance(eye[2], eye[4])) / (2.0 * width))
}

/// MAR = (|p1-p7| + |p2-p6| + |p3-p5|) / (2 * |p0-p4|)
fn mouth_aspect_ratio(lips: &[(f32, f32)]) -> Option<f32> {
    let width = distance(lips[0], lips[4]);
    if width <= f32::EPSILON {
        return None;
    }
    Some((distance(lips[1], lips[7]) + distance(lips[2], lips[6]) + distance(lips[3], lips[5])) / (2.0 * width))
}

impl FaceGeometry {
    /// 潰れた顔（目の幅ゼロなど）は `None`
    pub fn from_landmarks(face: &FaceLandmarks) -> Option<Self> {
        let span = distance(face.point(RIGHT_EYE_OUTER), face.point(LEFT_EYE_OUTER));
        if span <= f32::EPSILON {
            return None;
        }

        let right_ear = eye_aspect_ratio(face.region(RIGHT_EYE))?;
        let left_ear = eye_aspect_ratio(face.region(LEFT_EYE))?;
        let mouth_aperture = mouth_aspect_ratio(face.region(INNER_LIPS))?;

        // y は下向きなので 目 - 眉 が正
        let right_brow = mean_y(face.region(RIGHT_EYE)) - mean_y(face.region(RIGHT_BROW));
        let left_brow = mean_y(face.region(LEFT_EYE)) - mean_y(face.region(LEFT_BROW));

        Some(Self {
            eye_aperture: (right_ear + left_ear) / 2.0,
            mouth_aperture,
            brow_height: (right_brow + left_brow) / 2.0 / span,
            mouth_width: distance(face.point(MOUTH_LEFT), face.point(MOUTH_RIGHT)) / span,
        })
    }
}
