// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::Path;

use opencv::{
  core::{Mat, Vector},
  imgcodecs,
};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::BgrFrame,
  label::WithLabel,
  model::DetectResult,
  output::{Render, draw::Draw},
};

pub struct SaveImageFileOutput {
  path: String,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] opencv::Error),
  #[error("图像编码失败: {0}")]
  EncodeFailed(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let with_score = uri.query_pairs().any(|(k, _)| k == "score");
    Ok(SaveImageFileOutput {
      path: crate::decoded_path(uri),
      draw: Draw::default().with_score(with_score),
    })
  }
}

/// 写入图像文件，必要时创建父目录
pub(crate) fn write_image(path: &Path, image: &Mat) -> Result<(), SaveImageFileError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }

  let path_str = path.to_string_lossy();
  if !imgcodecs::imwrite(&path_str, image, &Vector::new())? {
    return Err(SaveImageFileError::EncodeFailed(path_str.into_owned()));
  }
  Ok(())
}

impl<T: WithLabel> Render<BgrFrame, DetectResult<T>> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &BgrFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    let image = self.draw.draw_detection(frame, result)?;
    write_image(Path::new(&self.path), &image)?;
    warn!("保存图像到文件: {}", self.path);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    label::ClassLabel,
    model::{DetectItem, PixelRect},
  };
  use opencv::{
    core::{CV_8UC3, Scalar},
    prelude::*,
  };

  #[test]
  fn saves_annotated_image_into_new_directory() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested").join("out.png");
    let url = Url::parse(&format!("image://{}", target.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    let image =
      Mat::new_rows_cols_with_default(64, 64, CV_8UC3, Scalar::all(0.0)).unwrap();
    let frame = BgrFrame::new(image, 1, 0, 1.0);
    let result = DetectResult {
      items: vec![DetectItem {
        kind: ClassLabel::new(0, "person"),
        score: 0.9,
        bbox: PixelRect::new(10, 20, 30, 30),
      }]
      .into_boxed_slice(),
    };

    output.render_result(&frame, &result).unwrap();

    let saved = imgcodecs::imread(target.to_str().unwrap(), imgcodecs::IMREAD_COLOR).unwrap();
    assert_eq!((saved.cols(), saved.rows()), (64, 64));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("window:main").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
