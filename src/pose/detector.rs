use anyhow::{Context, Result};
use ndarray::Array4;
use opencv::core::Mat;
use opencv::prelude::*;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{ModelConfig, PoseConfig};

use super::crop::{clip_to_frame, crop_mat, face_bbox_from_pose, remap_landmarks};
use super::face::{FaceCapability, FaceLandmarks};
use super::face_detector::FaceLandmarker;
use super::keypoint::{Keypoint, Pose, PoseFrame};
use super::preprocess::{preprocess_for_face, preprocess_for_movenet};
use super::source::{CapturedFrame, KeypointSource};

/// 顔クロップの辺 = 頭部キーポイントの横幅 × この値
const FACE_CROP_SCALE: f32 = 1.6;

/// MoveNet を使用した姿勢検出器
pub struct PoseDetector {
    session: Session,
}

impl PoseDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load ONNX model")?;

        Ok(Self { session })
    }

    /// 前処理済みテンソルから姿勢を検出
    ///
    /// 入力: [1, 192, 192, 3] の f32 テンソル
    /// 出力: Pose (17キーポイント)
    pub fn detect(&mut self, input: Array4<f32>) -> Result<Pose> {
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Inference failed")?;

        // MoveNet の出力は [1, 1, 17, 3] (y, x, confidence)
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract output tensor")?;

        let keypoints = std::array::from_fn(|i| {
            Keypoint::new(output[[0, 0, i, 1]], output[[0, 0, i, 0]], output[[0, 0, i, 2]])
        });

        Ok(Pose::new(keypoints))
    }
}

/// カメラ画像に対する MoveNet + 顔ランドマークの推論
pub struct OnnxKeypointSource {
    pose: PoseDetector,
    face: Option<FaceLandmarker>,
    capability: FaceCapability,
    floor: f32,
}

impl OnnxKeypointSource {
    /// 姿勢モデルは必須。顔モデルが読めなければ縮退モードで続行する
    pub fn load(models: &ModelConfig, pose: &PoseConfig) -> Result<Self> {
        let detector = PoseDetector::new(&models.pose)
            .with_context(|| format!("pose model: {}", models.pose))?;
        info!(path = %models.pose, "pose model loaded");

        let (face, capability) = match &models.face {
            None => (
                None,
                FaceCapability::Unavailable {
                    reason: "no face model configured".to_string(),
                },
            ),
            Some(path) => match FaceLandmarker::new(path) {
                Ok(landmarker) => {
                    info!(path = %path, "face model loaded");
                    (Some(landmarker), FaceCapability::Available)
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(path = %path, reason = %reason, "face model unavailable");
                    (None, FaceCapability::Unavailable { reason })
                }
            },
        };

        Ok(Self {
            pose: detector,
            face,
            capability,
            floor: pose.confidence_floor,
        })
    }
}

impl KeypointSource<Mat> for OnnxKeypointSource {
    fn detect_pose(&mut self, frame: &CapturedFrame<Mat>) -> Result<PoseFrame> {
        let input = preprocess_for_movenet(&frame.image)?;
        let pose = self.pose.detect(input)?;
        Ok(PoseFrame::new(pose.sanitized(), frame.timestamp))
    }

    fn detect_face(&mut self, frame: &CapturedFrame<Mat>, pose: &PoseFrame) -> Result<Option<FaceLandmarks>> {
        let Some(landmarker) = self.face.as_mut() else {
            return Ok(None);
        };
        let (w, h) = (frame.image.cols() as u32, frame.image.rows() as u32);
        let Some(region) = face_bbox_from_pose(pose, w, h, self.floor, FACE_CROP_SCALE)
            .and_then(|bbox| clip_to_frame(&bbox, w, h))
        else {
            return Ok(None);
        };

        let crop = crop_mat(&frame.image, &region)?;
        let input = preprocess_for_face(&crop)?;
        Ok(landmarker
            .detect(input)?
            .map(|landmarks| remap_landmarks(&landmarks, &region)))
    }

    fn face_capability(&self) -> &FaceCapability {
        &self.capability
    }
}
