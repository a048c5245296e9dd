// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::cmp::Ordering;

use crate::model::DetectItem;

/// 贪心 NMS，返回保留下来的候选框下标（按分数降序）
///
/// 分数未严格超过 `score_threshold` 的候选框直接丢弃；与已保留框的 IoU
/// 严格大于 `iou_threshold` 的候选框被抑制。不区分类别。
/// 排序是稳定的，分数相同时先出现的候选框优先。
pub fn nms_indices<T>(
  candidates: &[DetectItem<T>],
  score_threshold: f32,
  iou_threshold: f32,
) -> Vec<usize> {
  let mut order: Vec<usize> = (0..candidates.len())
    .filter(|&idx| candidates[idx].score > score_threshold)
    .collect();
  order.sort_by(|&a, &b| {
    candidates[b]
      .score
      .partial_cmp(&candidates[a].score)
      .unwrap_or(Ordering::Equal)
  });

  let mut keep: Vec<usize> = Vec::with_capacity(order.len());
  for idx in order {
    let bbox = &candidates[idx].bbox;
    if keep
      .iter()
      .all(|&kept| candidates[kept].bbox.iou(bbox) <= iou_threshold)
    {
      keep.push(idx);
    }
  }

  keep
}

/// 对候选框做 NMS，返回保留的候选框
pub fn nms<T>(
  candidates: Vec<DetectItem<T>>,
  score_threshold: f32,
  iou_threshold: f32,
) -> Vec<DetectItem<T>> {
  let keep = nms_indices(&candidates, score_threshold, iou_threshold);

  let mut slots: Vec<Option<DetectItem<T>>> = candidates.into_iter().map(Some).collect();
  keep
    .into_iter()
    .filter_map(|idx| slots[idx].take())
    .collect()
}
