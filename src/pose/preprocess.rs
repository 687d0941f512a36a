use anyhow::Result;
use ndarray::Array4;
use opencv::{
    core::{AlgorithmHint, Mat, Size, Vec3f, CV_32FC3},
    imgproc,
    prelude::*,
};

/// MoveNet用の入力サイズ
pub const MOVENET_INPUT_SIZE: i32 = 192;

/// 顔ランドマークモデル（PFLD系）の入力サイズ
pub const FACE_INPUT_SIZE: i32 = 112;

/// BGR → RGB、リサイズ、f32 化
fn rgb_f32(frame: &Mat, size: i32, scale: f64) -> Result<Mat> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;

    let mut resized = Mat::default();
    imgproc::resize(&rgb, &mut resized, Size::new(size, size), 0.0, 0.0, imgproc::INTER_LINEAR)?;

    let mut float_mat = Mat::default();
    resized.convert_to(&mut float_mat, CV_32FC3, scale, 0.0)?;
    Ok(float_mat)
}

/// OpenCV Mat を MoveNet用の入力テンソルに変換
///
/// - BGR -> RGB
/// - 192x192 にリサイズ
/// - [1, 192, 192, 3] の f32 テンソルに変換 (0.0-255.0)
pub fn preprocess_for_movenet(frame: &Mat) -> Result<Array4<f32>> {
    let float_mat = rgb_f32(frame, MOVENET_INPUT_SIZE, 1.0)?;
    let n = MOVENET_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, n, n, 3));

    for y in 0..MOVENET_INPUT_SIZE {
        for x in 0..MOVENET_INPUT_SIZE {
            let pixel = float_mat.at_2d::<Vec3f>(y, x)?;
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c];
            }
        }
    }

    Ok(tensor)
}

/// 顔クロップを [1, 3, 112, 112] の NCHW テンソル (0.0-1.0) に変換
pub fn preprocess_for_face(face: &Mat) -> Result<Array4<f32>> {
    let float_mat = rgb_f32(face, FACE_INPUT_SIZE, 1.0 / 255.0)?;
    let n = FACE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, n, n));

    for y in 0..FACE_INPUT_SIZE {
        for x in 0..FACE_INPUT_SIZE {
            let pixel = float_mat.at_2d::<Vec3f>(y, x)?;
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel[c];
            }
        }
    }

    Ok(tensor)
}
