use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};
use std::time::Instant;
use tracing::info;

use crate::config::CameraConfig;
use crate::error::SessionError;
use crate::pose::source::{CapturedFrame, FrameSource};

/// OpenCVを使用したカメラキャプチャ
pub struct OpenCvCamera {
    capture: VideoCapture,
    width: u32,
    height: u32,
    started: Instant,
}

impl OpenCvCamera {
    /// 設定の解像度でカメラを開く
    pub fn open(config: &CameraConfig) -> Result<Self> {
        Self::open_with_resolution(config.index, Some(config.width), Some(config.height))
    }

    /// 解像度を指定してカメラを開く
    pub fn open_with_resolution(index: i32, width: Option<u32>, height: Option<u32>) -> Result<Self> {
        let mut capture =
            VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32).context("Failed to open camera")?;

        if !capture.is_opened()? {
            anyhow::bail!("Camera {} is not available", index);
        }

        if let Some(w) = width {
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, w as f64)?;
        }
        if let Some(h) = height {
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, h as f64)?;
        }
        // 古いフレームを溜めない
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let actual_fps = capture.get(videoio::CAP_PROP_FPS)?;
        info!(index, width = actual_width, height = actual_height, fps = actual_fps, "camera opened");

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
            started: Instant::now(),
        })
    }

    /// 解像度を取得
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// フレームを読み込む（BGR形式）
    pub fn read_frame(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        let ok = self
            .capture
            .read(&mut frame)
            .context("Failed to read frame")?;

        if !ok || frame.empty() {
            anyhow::bail!("Empty frame received");
        }

        Ok(frame)
    }
}

impl FrameSource for OpenCvCamera {
    type Frame = Mat;

    /// タイムスタンプはカメラを開いてからの経過時間
    fn capture(&mut self) -> Result<CapturedFrame<Mat>, SessionError> {
        let frame = self
            .read_frame()
            .map_err(|e| SessionError::CaptureFailed(format!("{:#}", e)))?;
        Ok(CapturedFrame::new(frame, self.started.elapsed()))
    }
}
