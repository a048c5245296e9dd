// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/decode.rs - YOLO 原始输出解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! 每一行的布局为 `[cx, cy, w, h, objectness, class_0, ..., class_n]`，
//! 坐标均归一化到 `[0, 1]`。

use tracing::{debug, warn};

use crate::model::{DetectItem, PixelRect};

/// 类别分数从第 5 列开始
pub const CLASS_SCORE_OFFSET: usize = 5;

/// 一个输出层的二维张量，按行连续存放
#[derive(Debug, Clone, Copy)]
pub struct OutputTensor<'a> {
  data: &'a [f32],
  cols: usize,
}

impl<'a> OutputTensor<'a> {
  /// 列数不足或数据长度与列数不匹配时返回 None
  pub fn new(data: &'a [f32], cols: usize) -> Option<Self> {
    if cols <= CLASS_SCORE_OFFSET || data.is_empty() || data.len() % cols != 0 {
      return None;
    }
    Some(Self { data, cols })
  }

  pub fn rows(self) -> impl Iterator<Item = &'a [f32]> {
    self.data.chunks_exact(self.cols)
  }

  pub fn num_rows(self) -> usize {
    self.data.len() / self.cols
  }
}

/// 取类别分数的最大值及其下标；相同分数取靠前的类别
pub fn arg_max(scores: &[f32]) -> Option<(usize, f32)> {
  scores
    .iter()
    .copied()
    .enumerate()
    .fold(None, |best, (idx, score)| match best {
      Some((_, best_score)) if score <= best_score => best,
      _ => Some((idx, score)),
    })
}

/// 把归一化的中心点/宽高换算成帧上的像素矩形
pub fn to_pixel_rect(row: &[f32], frame_width: i32, frame_height: i32) -> PixelRect {
  let (w, h) = (frame_width as f32, frame_height as f32);
  let center_x = (row[0] * w) as i32;
  let center_y = (row[1] * h) as i32;
  let box_width = (row[2] * w) as i32;
  let box_height = (row[3] * h) as i32;

  PixelRect::new(
    center_x.saturating_sub(box_width / 2),
    center_y.saturating_sub(box_height / 2),
    box_width,
    box_height,
  )
}

/// 解码单行；最高类别分数未严格超过阈值或坐标不是有限值时返回 None
pub fn decode_row(
  row: &[f32],
  frame_width: i32,
  frame_height: i32,
  confidence_threshold: f32,
) -> Option<DetectItem<usize>> {
  let (class_id, confidence) = arg_max(row.get(CLASS_SCORE_OFFSET..)?)?;
  if confidence <= confidence_threshold {
    return None;
  }
  if !row[..4].iter().all(|v| v.is_finite()) {
    warn!("跳过坐标无效的候选框: {:?}", &row[..4]);
    return None;
  }

  Some(DetectItem {
    kind: class_id,
    score: confidence,
    bbox: to_pixel_rect(row, frame_width, frame_height),
  })
}

/// 按扫描顺序收集所有输出层中超过置信度阈值的候选框
pub fn decode_candidates(
  tensors: &[OutputTensor<'_>],
  frame_width: i32,
  frame_height: i32,
  confidence_threshold: f32,
) -> Vec<DetectItem<usize>> {
  let mut candidates = Vec::new();

  for (layer, tensor) in tensors.iter().enumerate() {
    let before = candidates.len();
    candidates.extend(
      tensor
        .rows()
        .filter_map(|row| decode_row(row, frame_width, frame_height, confidence_threshold)),
    );
    debug!(
      "输出层 {}: {} 行, 保留 {} 个候选框",
      layer,
      tensor.num_rows(),
      candidates.len() - before
    );
  }

  candidates
}

/// 从原始数据构造张量，跳过格式不正确的输出层
pub fn collect_tensors<'a>(
  raw: impl IntoIterator<Item = (&'a [f32], usize)>,
) -> Vec<OutputTensor<'a>> {
  raw
    .into_iter()
    .enumerate()
    .filter_map(|(layer, (data, cols))| {
      let tensor = OutputTensor::new(data, cols);
      if tensor.is_none() {
        warn!(
          "跳过输出层 {}: 数据长度 {}, 列数 {}",
          layer,
          data.len(),
          cols
        );
      }
      tensor
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row(cx: f32, cy: f32, w: f32, h: f32, scores: &[f32]) -> Vec<f32> {
    let mut row = vec![cx, cy, w, h, 1.0];
    row.extend_from_slice(scores);
    row
  }

  #[test]
  fn arg_max_picks_strictly_greatest_entry() {
    assert_eq!(arg_max(&[0.1, 0.95, 0.3]), Some((1, 0.95)));
    assert_eq!(arg_max(&[]), None);
  }

  #[test]
  fn arg_max_prefers_first_on_ties() {
    assert_eq!(arg_max(&[0.2, 0.9, 0.9]), Some((1, 0.9)));
  }

  #[test]
  fn predicted_class_is_index_of_max_score() {
    let row = row(0.5, 0.5, 0.2, 0.2, &[0.0, 0.1, 0.0, 0.92]);
    let item = decode_row(&row, 100, 100, 0.8).unwrap();
    assert_eq!(item.kind, 3);
    assert_eq!(item.score, 0.92);
  }

  #[test]
  fn row_below_threshold_is_dropped() {
    let row = row(0.5, 0.5, 0.2, 0.2, &[0.5, 0.1]);
    assert!(decode_row(&row, 100, 100, 0.8).is_none());
  }

  #[test]
  fn row_equal_to_threshold_is_dropped() {
    let row = row(0.5, 0.5, 0.2, 0.2, &[0.8]);
    assert!(decode_row(&row, 100, 100, 0.8).is_none());
  }

  #[test]
  fn center_size_converts_to_top_left_rect() {
    let row = row(0.5, 0.5, 0.2, 0.2, &[0.9]);
    let item = decode_row(&row, 100, 100, 0.8).unwrap();
    assert_eq!(item.bbox, PixelRect::new(40, 40, 20, 20));
  }

  #[test]
  fn non_square_frame_scales_each_axis() {
    let row = row(0.5, 0.25, 0.5, 0.5, &[0.9]);
    let item = decode_row(&row, 200, 100, 0.8).unwrap();
    assert_eq!(item.bbox, PixelRect::new(50, 0, 100, 50));
  }

  #[test]
  fn short_row_is_skipped() {
    assert!(decode_row(&[0.5, 0.5, 0.2, 0.2, 1.0], 100, 100, 0.8).is_none());
    assert!(decode_row(&[0.5, 0.5], 100, 100, 0.8).is_none());
  }

  #[test]
  fn rows_with_non_finite_coordinates_are_skipped() {
    let data = [
      row(f32::INFINITY, 0.5, f32::INFINITY, 0.2, &[0.9]),
      row(0.5, f32::NAN, 0.2, 0.2, &[0.95]),
      row(0.5, 0.5, 0.2, f32::NEG_INFINITY, &[0.95]),
      row(0.5, 0.5, 0.2, 0.2, &[0.85]),
    ]
    .concat();
    let tensors = collect_tensors([(data.as_slice(), 6)]);

    let candidates = decode_candidates(&tensors, 100, 100, 0.8);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].bbox, PixelRect::new(40, 40, 20, 20));
    assert_eq!(crate::model::nms::nms(candidates, 0.8, 0.8).len(), 1);
  }

  #[test]
  fn huge_finite_coordinates_survive_nms_without_overflow() {
    let data = [
      row(1.0e30, 0.5, 1.0e30, 0.2, &[0.9]),
      row(-1.0e30, 0.5, 1.0e30, 0.2, &[0.95]),
    ]
    .concat();
    let tensors = collect_tensors([(data.as_slice(), 6)]);

    let candidates = decode_candidates(&tensors, 100, 100, 0.8);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[1].bbox.x, i32::MIN);
    let kept = crate::model::nms::nms(candidates, 0.8, 0.8);
    assert!(!kept.is_empty());
  }

  #[test]
  fn candidates_keep_scan_order_across_tensors() {
    let first: Vec<f32> = [
      row(0.1, 0.1, 0.1, 0.1, &[0.9, 0.0]),
      row(0.5, 0.5, 0.1, 0.1, &[0.2, 0.3]),
    ]
    .concat();
    let second: Vec<f32> = row(0.75, 0.75, 0.1, 0.1, &[0.0, 0.85]);

    let tensors = collect_tensors([(first.as_slice(), 7), (second.as_slice(), 7)]);
    assert_eq!(tensors.len(), 2);

    let candidates = decode_candidates(&tensors, 100, 100, 0.8);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].kind, 0);
    assert_eq!(candidates[1].kind, 1);
    assert_eq!(candidates[1].bbox, PixelRect::new(70, 70, 10, 10));
  }

  #[test]
  fn malformed_tensors_are_skipped() {
    let ragged = vec![0.0f32; 10];
    let narrow = vec![0.0f32; 10];
    let empty: Vec<f32> = Vec::new();
    let good = row(0.5, 0.5, 0.2, 0.2, &[0.9]);

    let tensors = collect_tensors([
      (ragged.as_slice(), 7),
      (narrow.as_slice(), 5),
      (empty.as_slice(), 6),
      (good.as_slice(), 6),
    ]);
    assert_eq!(tensors.len(), 1);
    assert_eq!(decode_candidates(&tensors, 100, 100, 0.8).len(), 1);
  }

  #[test]
  fn nothing_above_threshold_yields_no_candidates() {
    let data = [row(0.5, 0.5, 0.2, 0.2, &[0.1]), row(0.2, 0.2, 0.1, 0.1, &[0.3])].concat();
    let tensors = collect_tensors([(data.as_slice(), 6)]);
    assert!(decode_candidates(&tensors, 100, 100, 0.8).is_empty());
  }
}
