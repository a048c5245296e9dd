// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use opencv::{imgcodecs, prelude::*};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::BgrFrame, input::camera::parse_scale};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("Image not found or unreadable: {0}")]
  NotFound(String),
  #[error("Invalid scale: {0}")]
  InvalidScale(String),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] opencv::Error),
}

/// 单张图像，只产出一帧
pub struct ImageFileInput {
  image: Option<BgrFrame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let scale = match crate::query_value(url, "scale") {
      None => 1.0,
      Some(value) => parse_scale(&value).ok_or(ImageFileInputError::InvalidScale(value))?,
    };

    let path = crate::decoded_path(url);
    let image = imgcodecs::imread(&path, imgcodecs::IMREAD_COLOR)?;
    if image.empty() {
      return Err(ImageFileInputError::NotFound(path));
    }
    info!("读取图像: {} ({}x{})", path, image.cols(), image.rows());

    Ok(ImageFileInput {
      image: Some(BgrFrame::scaled(image, 1, 0, scale)?),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = BgrFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}
