// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use opencv::{
  core::{Mat, Point, Scalar},
  imgproc,
  prelude::*,
};

use crate::{
  frame::BgrFrame,
  label::WithLabel,
  model::{DetectItem, DetectResult, PixelRect},
};

// 文本渲染常量
const LABEL_FONT_SCALE: f64 = 1.0;
const LABEL_THICKNESS: i32 = 1;
const LABEL_OFFSET_X: i32 = 5;
const LABEL_OFFSET_Y: i32 = -5;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [f64; 3] = [0.0, 255.0, 0.0]; // 绿色 (BGR)

pub struct Draw {
  box_color: Scalar,
  box_thickness: i32,
  font_face: i32,
  font_scale: f64,
  label_thickness: i32,
  with_score: bool,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      box_color: Scalar::new(BOX_COLOR[0], BOX_COLOR[1], BOX_COLOR[2], 0.0),
      box_thickness: BOX_THICKNESS,
      font_face: imgproc::FONT_HERSHEY_PLAIN,
      font_scale: LABEL_FONT_SCALE,
      label_thickness: LABEL_THICKNESS,
      with_score: false,
    }
  }
}

/// 标签文字的基线起点：框左上角向右 5 像素、向上 5 像素
pub fn label_origin(bbox: &PixelRect) -> Point {
  Point::new(bbox.x + LABEL_OFFSET_X, bbox.y + LABEL_OFFSET_Y)
}

impl Draw {
  /// 标签后附带分数，如 `person 0.93`
  pub fn with_score(mut self, with_score: bool) -> Self {
    self.with_score = with_score;
    self
  }

  fn label_text<T: WithLabel>(&self, item: &DetectItem<T>) -> String {
    if self.with_score {
      format!("{} {:.2}", item.kind.to_label_str(), item.score)
    } else {
      item.kind.to_label_str()
    }
  }

  fn draw_bbox_with_label<T: WithLabel>(
    &self,
    image: &mut Mat,
    item: &DetectItem<T>,
  ) -> opencv::Result<()> {
    imgproc::rectangle(
      image,
      item.bbox.into(),
      self.box_color,
      self.box_thickness,
      imgproc::LINE_8,
      0,
    )?;

    imgproc::put_text(
      image,
      &self.label_text(item),
      label_origin(&item.bbox),
      self.font_face,
      self.font_scale,
      self.box_color,
      self.label_thickness,
      imgproc::LINE_8,
      false,
    )
  }

  pub fn draw_detections_on_image<T: WithLabel>(
    &self,
    image: &mut Mat,
    result: &DetectResult<T>,
  ) -> opencv::Result<()> {
    for item in result.items.iter() {
      self.draw_bbox_with_label(image, item)?;
    }
    Ok(())
  }

  /// 复制帧图像并在副本上绘制检测结果
  pub fn draw_detection<T: WithLabel>(
    &self,
    frame: &BgrFrame,
    result: &DetectResult<T>,
  ) -> opencv::Result<Mat> {
    let mut image = frame.image().try_clone()?;
    self.draw_detections_on_image(&mut image, result)?;
    Ok(image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::label::ClassLabel;
  use opencv::core::{CV_8UC3, Vec3b};

  fn blank(width: i32, height: i32) -> Mat {
    Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0)).unwrap()
  }

  #[test]
  fn label_sits_above_and_right_of_top_left() {
    assert_eq!(
      label_origin(&PixelRect::new(40, 40, 20, 20)),
      Point::new(45, 35)
    );
  }

  #[test]
  fn boxes_are_drawn_in_green() {
    let frame = BgrFrame::new(blank(100, 100), 1, 0, 1.0);
    let result = DetectResult {
      items: vec![DetectItem {
        kind: ClassLabel::new(0, "person"),
        score: 0.9,
        bbox: PixelRect::new(40, 40, 20, 20),
      }]
      .into_boxed_slice(),
    };

    let image = Draw::default().draw_detection(&frame, &result).unwrap();
    let edge = image.at_2d::<Vec3b>(50, 40).unwrap();
    assert_eq!(edge.0, [0, 255, 0]);
    let inside = image.at_2d::<Vec3b>(50, 50).unwrap();
    assert_eq!(inside.0, [0, 0, 0]);

    // 原帧保持不变
    let original = frame.image().at_2d::<Vec3b>(50, 40).unwrap();
    assert_eq!(original.0, [0, 0, 0]);
  }

  #[test]
  fn empty_result_leaves_image_untouched() {
    let frame = BgrFrame::new(blank(32, 32), 1, 0, 1.0);
    let result: DetectResult<ClassLabel> = DetectResult {
      items: Vec::new().into_boxed_slice(),
    };
    let image = Draw::default().draw_detection(&frame, &result).unwrap();
    let sum = opencv::core::sum_elems(&image).unwrap();
    assert_eq!(sum, Scalar::all(0.0));
  }

  #[test]
  fn label_text_optionally_includes_score() {
    let item = DetectItem {
      kind: ClassLabel::new(2, "car"),
      score: 0.93,
      bbox: PixelRect::new(0, 0, 1, 1),
    };
    assert_eq!(Draw::default().label_text(&item), "car");
    assert_eq!(Draw::default().with_score(true).label_text(&item), "car 0.93");
  }
}
