// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/camera.rs - 摄像头输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # 摄像头输入模块
//!
//! 基于 OpenCV `VideoCapture` 打开摄像头，逐帧读取 BGR 图像，
//! 并在送入网络前按比例缩小以提高吞吐。
//!
//! ## URL 格式
//!
//! - `camera:0`：按设备序号打开（默认 0）
//! - `camera:///dev/video2`：按设备路径打开
//! - 查询参数 `api`：`any`（默认）、`dshow`、`msmf`、`v4l2`、`avfoundation`
//! - 查询参数 `scale`：缩放比例，取值 (0, 1]，默认 0.4
//!
//! ## 基本用法
//!
//! ```no_run
//! use beifeng::{FromUrl, input::CameraInput};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("camera:0?scale=0.5")?;
//! let camera = CameraInput::from_url(&url)?;
//!
//! for frame in camera.take(10) {
//!   println!("第 {} 帧: {}x{}", frame.index(), frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! 摄像头在 `CameraInput` 被丢弃时释放。

use std::time::Instant;

use opencv::{
  core::Mat,
  prelude::*,
  videoio::{self, VideoCapture},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::BgrFrame};

pub const DEFAULT_CAMERA_SCALE: f64 = 0.4;

#[derive(Error, Debug)]
pub enum CameraInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("不支持的采集后端: {0}")]
  UnsupportedApi(String),
  #[error("缩放比例无效: {0}")]
  InvalidScale(String),
  #[error("无法打开摄像头: {0}")]
  OpenFailed(String),
  #[error("OpenCV 错误: {0}")]
  OpenCvError(#[from] opencv::Error),
}

/// 摄像头设备：序号或路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraDevice {
  Index(i32),
  Path(String),
}

impl std::fmt::Display for CameraDevice {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CameraDevice::Index(index) => write!(f, "#{}", index),
      CameraDevice::Path(path) => write!(f, "{}", path),
    }
  }
}

/// 解析后的摄像头参数
#[derive(Debug, Clone, PartialEq)]
pub struct CameraOptions {
  pub device: CameraDevice,
  pub api: i32,
  pub scale: f64,
}

impl CameraOptions {
  pub fn parse(url: &Url) -> Result<Self, CameraInputError> {
    if url.scheme() != CameraInput::SCHEME {
      return Err(CameraInputError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        CameraInput::SCHEME,
        url.scheme()
      )));
    }

    let path = crate::decoded_path(url);
    let path = path.trim();
    let device = if path.is_empty() || path == "/" {
      CameraDevice::Index(0)
    } else {
      match path.trim_start_matches('/').parse::<i32>() {
        Ok(index) => CameraDevice::Index(index),
        Err(_) => CameraDevice::Path(path.to_string()),
      }
    };

    let api = match crate::query_value(url, "api").as_deref() {
      None | Some("any") => videoio::CAP_ANY,
      Some("dshow") => videoio::CAP_DSHOW,
      Some("msmf") => videoio::CAP_MSMF,
      Some("v4l2") => videoio::CAP_V4L2,
      Some("avfoundation") => videoio::CAP_AVFOUNDATION,
      Some(other) => return Err(CameraInputError::UnsupportedApi(other.to_string())),
    };

    let scale = match crate::query_value(url, "scale") {
      None => DEFAULT_CAMERA_SCALE,
      Some(value) => parse_scale(&value).ok_or(CameraInputError::InvalidScale(value))?,
    };

    Ok(CameraOptions { device, api, scale })
  }
}

/// 缩放比例须位于 (0, 1]
pub(crate) fn parse_scale(value: &str) -> Option<f64> {
  value
    .parse::<f64>()
    .ok()
    .filter(|scale| *scale > 0.0 && *scale <= 1.0)
}

pub struct CameraInput {
  capture: VideoCapture,
  device: CameraDevice,
  scale: f64,
  frame_index: u64,
  started: Instant,
}

impl FromUrlWithScheme for CameraInput {
  const SCHEME: &'static str = "camera";
}

impl FromUrl for CameraInput {
  type Error = CameraInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let options = CameraOptions::parse(url)?;
    Self::open(options)
  }
}

impl CameraInput {
  pub fn open(options: CameraOptions) -> Result<Self, CameraInputError> {
    info!("打开摄像头: {}", options.device);
    let capture = match &options.device {
      CameraDevice::Index(index) => VideoCapture::new(*index, options.api)?,
      CameraDevice::Path(path) => VideoCapture::from_file(path, options.api)?,
    };

    if !capture.is_opened()? {
      error!("摄像头 {} 打开失败", options.device);
      return Err(CameraInputError::OpenFailed(options.device.to_string()));
    }

    let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
    let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
    info!(
      "摄像头已打开: {}x{}, 缩放比例 {}",
      width, height, options.scale
    );

    Ok(CameraInput {
      capture,
      device: options.device,
      scale: options.scale,
      frame_index: 0,
      started: Instant::now(),
    })
  }

  fn capture_frame(&mut self) -> Result<Option<BgrFrame>, CameraInputError> {
    let mut image = Mat::default();
    if !self.capture.read(&mut image)? || image.empty() {
      return Ok(None);
    }

    self.frame_index += 1;
    let timestamp_ms = self.started.elapsed().as_millis() as u64;
    let frame = BgrFrame::scaled(image, self.frame_index, timestamp_ms, self.scale)?;
    debug!(
      "采集第 {} 帧: {}x{}",
      frame.index(),
      frame.width(),
      frame.height()
    );
    Ok(Some(frame))
  }
}

impl Iterator for CameraInput {
  type Item = BgrFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self.capture_frame() {
      Ok(Some(frame)) => Some(frame),
      Ok(None) => {
        warn!("摄像头 {} 没有更多帧", self.device);
        None
      }
      Err(e) => {
        error!("采集帧失败: {}", e);
        None
      }
    }
  }
}

impl Drop for CameraInput {
  fn drop(&mut self) {
    info!("释放摄像头: {}", self.device);
    if let Err(e) = self.capture.release() {
      warn!("释放摄像头失败: {}", e);
    }
  }
}
