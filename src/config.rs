// 该文件是 Beifeng （北风） 项目的一部分。
// src/config.rs - 检测参数配置
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

use clap::Args;
use thiserror::Error;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.8;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.8;
pub const DEFAULT_INPUT_SIZE: i32 = 416;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("{name} 必须位于 [0, 1] 区间内, 实际为 {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("网络输入尺寸必须是 0 或 32 的正整数倍, 实际为 {0}")]
  InvalidInputSize(i32),
}

/// 检测参数
///
/// 置信度阈值、NMS 分数阈值和 NMS IoU 阈值相互独立。
#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
  /// 置信度阈值 (0.0 - 1.0)，类别最高分需严格大于该值
  #[arg(long = "confidence", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence_threshold: f32,

  /// NMS 分数阈值 (0.0 - 1.0)
  #[arg(long = "score-threshold", default_value_t = DEFAULT_SCORE_THRESHOLD, value_name = "THRESHOLD")]
  pub score_threshold: f32,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long = "nms-threshold", default_value_t = DEFAULT_NMS_THRESHOLD, value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 网络输入尺寸（正方形边长）；0 表示直接使用帧的尺寸
  #[arg(long = "input-size", default_value_t = DEFAULT_INPUT_SIZE, value_name = "PIXELS")]
  pub input_size: i32,
}

impl Default for DetectionConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      input_size: DEFAULT_INPUT_SIZE,
    }
  }
}

impl DetectionConfig {
  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_score_threshold(mut self, threshold: f32) -> Self {
    self.score_threshold = threshold;
    self
  }

  pub fn with_nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn with_input_size(mut self, input_size: i32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    check_unit_range("confidence", self.confidence_threshold)?;
    check_unit_range("score-threshold", self.score_threshold)?;
    check_unit_range("nms-threshold", self.nms_threshold)?;

    if self.input_size < 0 || self.input_size % 32 != 0 {
      return Err(ConfigError::InvalidInputSize(self.input_size));
    }

    Ok(())
  }
}

fn check_unit_range(name: &'static str, value: f32) -> Result<(), ConfigError> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::ThresholdOutOfRange { name, value })
  }
}
