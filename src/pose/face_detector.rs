use anyhow::{Context, Result};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use super::face::{FaceLandmarks, FACE_LANDMARK_COUNT};

/// 68点顔ランドマーク検出器
///
/// 入力 "input": [1, 3, 112, 112]、出力 "output": [1, 136]（クロップ内の正規化座標 x, y の並び）。
pub struct FaceLandmarker {
    session: Session,
}

impl FaceLandmarker {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load face landmark model")?;

        Ok(Self { session })
    }

    /// 顔クロップのテンソルからランドマークを推定（座標はクロップ内）
    pub fn detect(&mut self, input: Array4<f32>) -> Result<Option<FaceLandmarks>> {
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["input" => input_tensor])
            .context("Face inference failed")?;

        let output: ndarray::ArrayViewD<f32> = outputs["output"]
            .try_extract_array()
            .context("Failed to extract face landmarks")?;

        let values: Vec<f32> = output.iter().copied().take(FACE_LANDMARK_COUNT * 2).collect();
        Ok(FaceLandmarks::from_flat(&values))
    }
}
