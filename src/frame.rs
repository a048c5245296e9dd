// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - BGR 帧定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use opencv::{
  core::{Mat, Size},
  imgproc,
  prelude::*,
};

/// 一帧 BGR 图像及其采集信息
#[derive(Debug)]
pub struct BgrFrame {
  image: Mat,
  index: u64,
  timestamp_ms: u64,
  scale: f64,
}

impl BgrFrame {
  pub fn new(image: Mat, index: u64, timestamp_ms: u64, scale: f64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
      scale,
    }
  }

  /// 按比例缩放原始图像后构造帧；比例为 1 时不做缩放
  pub fn scaled(image: Mat, index: u64, timestamp_ms: u64, scale: f64) -> opencv::Result<Self> {
    let image = resize_by(&image, scale)?;
    Ok(Self::new(image, index, timestamp_ms, scale))
  }

  pub fn image(&self) -> &Mat {
    &self.image
  }

  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn timestamp_ms(&self) -> u64 {
    self.timestamp_ms
  }

  /// 相对于采集尺寸的缩放比例
  pub fn scale(&self) -> f64 {
    self.scale
  }

  pub fn width(&self) -> i32 {
    self.image.cols()
  }

  pub fn height(&self) -> i32 {
    self.image.rows()
  }
}

pub(crate) fn resize_by(image: &Mat, factor: f64) -> opencv::Result<Mat> {
  if (factor - 1.0).abs() < f64::EPSILON {
    return image.try_clone();
  }

  let mut resized = Mat::default();
  imgproc::resize(
    image,
    &mut resized,
    Size::new(0, 0),
    factor,
    factor,
    imgproc::INTER_LINEAR,
  )?;
  Ok(resized)
}
