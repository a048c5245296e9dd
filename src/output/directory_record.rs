// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::cell::Cell;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::BgrFrame,
  label::WithLabel,
  model::DetectResult,
  output::{
    Render,
    draw::Draw,
    save_image_file::{SaveImageFileError, write_image},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] SaveImageFileError),
  #[error("OpenCV 错误: {0}")]
  OpenCvError(#[from] opencv::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 检测结果以 JSON 形式写在图像旁边
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn to_json<T: WithLabel>(
    &self,
    frame: &BgrFrame,
    result: &DetectResult<T>,
  ) -> serde_json::Value {
    let detections: Vec<serde_json::Value> = result
      .items
      .iter()
      .map(|item| {
        let label = if self.label_with_name {
          json!(item.kind.to_label_str())
        } else {
          json!(item.kind.to_label_id())
        };
        json!({
          "label": label,
          "score": item.score,
          "bbox": [item.bbox.x, item.bbox.y, item.bbox.width, item.bbox.height],
        })
      })
      .collect();

    json!({
      "frame": frame.index(),
      "timestamp_ms": frame.timestamp_ms(),
      "width": frame.width(),
      "height": frame.height(),
      "detections": detections,
    })
  }

  pub fn record<T: WithLabel>(
    &self,
    frame: &BgrFrame,
    result: &DetectResult<T>,
    path: &Path,
  ) -> Result<(), DirectoryRecordOutputError> {
    let record = self.to_json(frame, result);
    std::fs::write(
      path.with_extension("json"),
      serde_json::to_string_pretty(&record)?,
    )?;
    Ok(())
  }
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result<T: WithLabel>(
    &self,
    path: &Path,
    frame: &BgrFrame,
    result: &DetectResult<T>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        let image = draw.draw_detection(frame, result)?;
        write_image(path, &image)?;
      }
      DrawWrapper::Record(record) => {
        write_image(path, frame.image())?;
        record.record(frame, result, path)?;
      }
    };

    Ok(())
  }

  pub fn with(kind: &str) -> Self {
    match kind {
      "record-name" => DrawWrapper::Record(Record {
        label_with_name: true,
      }),
      "record-id" => DrawWrapper::Record(Record {
        label_with_name: false,
      }),
      _ => DrawWrapper::Draw(Box::default()),
    }
  }
}

/// `folder:<dir>[?record=name|id][&always]`
///
/// 帧按日期写入 `<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.png`。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: Cell<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = match crate::query_value(uri, "record").as_deref() {
      None => "draw",
      Some("id") => "record-id",
      Some(_) => "record-name",
    };

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(crate::decoded_path(uri)),
      draw: DrawWrapper::with(kind),
      frame_counter: Cell::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let id = self.frame_counter.get().wrapping_add(1);
    self.frame_counter.set(id);
    id
  }

  fn frame_path_at(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl<T: WithLabel> Render<BgrFrame, DetectResult<T>> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &BgrFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }

    let path = self.frame_path_at(Utc::now())?;
    debug!("记录第 {} 帧到 {}", frame.index(), path.display());
    self.draw.save_result(&path, frame, result)
  }
}
