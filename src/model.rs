// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 像素坐标系下的矩形（左上角 + 宽高）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl PixelRect {
  pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn area(&self) -> i64 {
    i64::from(self.width.max(0)) * i64::from(self.height.max(0))
  }

  /// 交并比；两个框面积都为 0 时视为完全重合，返回 1
  pub fn iou(&self, other: &PixelRect) -> f32 {
    let (area_a, area_b) = (self.area(), other.area());
    if area_a == 0 && area_b == 0 {
      return 1.0;
    }

    let (ax, ay) = (i64::from(self.x), i64::from(self.y));
    let (bx, by) = (i64::from(other.x), i64::from(other.y));
    let x1 = ax.max(bx);
    let y1 = ay.max(by);
    let x2 = (ax + i64::from(self.width)).min(bx + i64::from(other.width));
    let y2 = (ay + i64::from(self.height)).min(by + i64::from(other.height));

    let intersection = (x2 - x1).max(0) * (y2 - y1).max(0);
    let union = area_a + area_b - intersection;

    if union > 0 {
      (intersection as f64 / union as f64) as f32
    } else {
      0.0
    }
  }
}

impl From<PixelRect> for opencv::core::Rect {
  fn from(rect: PixelRect) -> Self {
    opencv::core::Rect::new(rect.x, rect.y, rect.width, rect.height)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: PixelRect,
}

impl<T> DetectItem<T> {
  pub fn map_kind<U>(self, f: impl FnOnce(T) -> Option<U>) -> Option<DetectItem<U>> {
    let DetectItem { kind, score, bbox } = self;
    f(kind).map(|kind| DetectItem { kind, score, bbox })
  }
}

#[derive(Debug, Clone)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> DetectResult<T> {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl<T> FromIterator<DetectItem<T>> for DetectResult<T> {
  fn from_iter<I: IntoIterator<Item = DetectItem<T>>>(iter: I) -> Self {
    Self {
      items: iter.into_iter().collect(),
    }
  }
}

pub mod decode;
pub mod nms;

mod darknet;
pub use self::darknet::{DarknetError, DarknetYolo, DarknetYoloBuilder, postprocess};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn iou_of_identical_rects_is_one() {
    let rect = PixelRect::new(10, 10, 20, 20);
    assert!((rect.iou(&rect) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_disjoint_rects_is_zero() {
    let a = PixelRect::new(0, 0, 10, 10);
    let b = PixelRect::new(50, 50, 10, 10);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn iou_of_half_overlap() {
    let a = PixelRect::new(0, 0, 10, 10);
    let b = PixelRect::new(5, 0, 10, 10);
    // 交集 50，并集 150
    assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_two_empty_rects_is_one() {
    let a = PixelRect::new(3, 3, 0, 0);
    assert_eq!(a.iou(&a), 1.0);
    assert_eq!(a.iou(&PixelRect::new(50, 50, 0, 2)), 1.0);
  }

  #[test]
  fn iou_of_empty_and_nonempty_rect_is_zero() {
    let a = PixelRect::new(0, 0, 0, 0);
    let b = PixelRect::new(0, 0, 10, 10);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn iou_does_not_overflow_at_extreme_coordinates() {
    let a = PixelRect::new(i32::MAX - 1, 0, i32::MAX, 10);
    let b = PixelRect::new(i32::MAX - 1, 0, i32::MAX, 10);
    assert!((a.iou(&b) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn map_kind_drops_unmapped_items() {
    let item = DetectItem {
      kind: 3usize,
      score: 0.9,
      bbox: PixelRect::new(0, 0, 1, 1),
    };
    assert!(item.clone().map_kind(|_| None::<u8>).is_none());
    let mapped = item.map_kind(|k| Some(k * 2)).unwrap();
    assert_eq!(mapped.kind, 6);
    assert_eq!(mapped.score, 0.9);
  }
}
