// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/darknet.rs - Darknet YOLO 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use opencv::{
  core::{self, Mat, Scalar, Size, Vector},
  dnn,
  prelude::*,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::{ConfigError, DetectionConfig},
  frame::BgrFrame,
  label::{ClassLabel, LabelError, LabelList},
  model::{
    DetectResult, Model,
    decode::{self, OutputTensor},
    nms,
  },
};

const DEFAULT_CFG_FILE: &str = "yolov3.cfg";
const DEFAULT_WEIGHTS_FILE: &str = "yolov3.weights";
const DEFAULT_NAMES_FILE: &str = "coco.names";
const PIXEL_SCALE: f64 = 1.0 / 255.0;

#[derive(Error, Debug)]
pub enum DarknetError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型文件不存在: {0}")]
  FileNotFound(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("OpenCV 错误: {0}")]
  OpenCvError(#[from] opencv::Error),
  #[error("标签错误: {0}")]
  LabelError(#[from] LabelError),
  #[error("配置错误: {0}")]
  ConfigError(#[from] ConfigError),
}

pub struct DarknetYoloBuilder {
  model_dir: PathBuf,
  cfg_file: String,
  weights_file: String,
  names_file: String,
  config: DetectionConfig,
}

impl FromUrlWithScheme for DarknetYoloBuilder {
  const SCHEME: &'static str = "darknet";
}

impl FromUrl for DarknetYoloBuilder {
  type Error = DarknetError;

  /// `darknet:<dir>?cfg=..&weights=..&names=..`，查询参数均可省略
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DarknetError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let path = crate::decoded_path(url);
    let model_dir = if path.is_empty() {
      PathBuf::from(".")
    } else {
      PathBuf::from(path)
    };

    Ok(DarknetYoloBuilder {
      model_dir,
      cfg_file: crate::query_value(url, "cfg").unwrap_or_else(|| DEFAULT_CFG_FILE.to_string()),
      weights_file: crate::query_value(url, "weights")
        .unwrap_or_else(|| DEFAULT_WEIGHTS_FILE.to_string()),
      names_file: crate::query_value(url, "names")
        .unwrap_or_else(|| DEFAULT_NAMES_FILE.to_string()),
      config: DetectionConfig::default(),
    })
  }
}

impl DarknetYoloBuilder {
  pub fn config(mut self, config: DetectionConfig) -> Self {
    self.config = config;
    self
  }

  pub fn cfg_path(&self) -> PathBuf {
    self.model_dir.join(&self.cfg_file)
  }

  pub fn weights_path(&self) -> PathBuf {
    self.model_dir.join(&self.weights_file)
  }

  pub fn names_path(&self) -> PathBuf {
    self.model_dir.join(&self.names_file)
  }

  pub fn build(self) -> Result<DarknetYolo, DarknetError> {
    self.config.validate()?;

    let cfg_path = existing_path(self.cfg_path())?;
    let weights_path = existing_path(self.weights_path())?;
    let labels = LabelList::load(self.names_path())?;

    info!("加载模型文件: {} / {}", cfg_path, weights_path);
    let mut net = dnn::read_net_from_darknet(&cfg_path, &weights_path)?;
    if net.empty()? {
      return Err(DarknetError::ModelInvalid(format!(
        "无法从 {} 构建网络",
        cfg_path
      )));
    }

    net.set_preferable_backend(dnn::DNN_BACKEND_OPENCV)?;
    net.set_preferable_target(dnn::DNN_TARGET_CPU)?;

    let output_names = net.get_unconnected_out_layers_names()?;
    if output_names.is_empty() {
      return Err(DarknetError::ModelInvalid("网络没有输出层".to_string()));
    }
    debug!("模型输出层: {:?}", output_names.to_vec());
    info!("模型加载完成, 共 {} 个类别", labels.len());

    Ok(DarknetYolo {
      net,
      output_names,
      labels,
      config: self.config,
    })
  }
}

fn existing_path(path: PathBuf) -> Result<String, DarknetError> {
  if !path.is_file() {
    return Err(DarknetError::FileNotFound(path.display().to_string()));
  }
  path
    .to_str()
    .map(str::to_string)
    .ok_or_else(|| DarknetError::ModelPathError(format!("路径不是合法的 UTF-8: {}", path.display())))
}

/// 输入尺寸为 0 时返回空尺寸，OpenCV 按帧本身的尺寸构造 blob
fn blob_size(input_size: i32) -> Size {
  if input_size == 0 {
    Size::default()
  } else {
    Size::new(input_size, input_size)
  }
}

/// 加载后的网络、标签列表与检测参数
pub struct DarknetYolo {
  net: dnn::Net,
  output_names: Vector<String>,
  labels: LabelList,
  config: DetectionConfig,
}

impl DarknetYolo {
  pub fn labels(&self) -> &LabelList {
    &self.labels
  }

  pub fn config(&self) -> &DetectionConfig {
    &self.config
  }

  fn forward(&mut self, image: &Mat) -> Result<Vec<Mat>, DarknetError> {
    let blob = dnn::blob_from_image(
      image,
      PIXEL_SCALE,
      blob_size(self.config.input_size),
      Scalar::default(),
      true,
      false,
      core::CV_32F,
    )?;

    self.net.set_input(&blob, "", 1.0, Scalar::default())?;

    let mut outputs = Vector::<Mat>::new();
    self.net.forward(&mut outputs, &self.output_names)?;
    Ok(outputs.to_vec())
  }
}

impl Model for DarknetYolo {
  type Input = BgrFrame;
  type Output = DetectResult<ClassLabel>;
  type Error = DarknetError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("执行模型推理");
    let outputs = self.forward(input.image())?;

    let raw = outputs
      .iter()
      .enumerate()
      .filter_map(|(layer, mat)| match mat.data_typed::<f32>() {
        Ok(data) => Some((data, mat.cols().max(0) as usize)),
        Err(e) => {
          warn!("无法读取输出层 {}: {}", layer, e);
          None
        }
      });
    let tensors = decode::collect_tensors(raw);

    Ok(postprocess(
      &tensors,
      input.width(),
      input.height(),
      &self.config,
      &self.labels,
    ))
  }
}

/// 置信度过滤、坐标换算、附上类别名称，最后做 NMS
///
/// 类别下标超出标签列表的候选框在 NMS 之前丢弃，不会抑制其他候选框。
pub fn postprocess(
  tensors: &[OutputTensor<'_>],
  frame_width: i32,
  frame_height: i32,
  config: &DetectionConfig,
  labels: &LabelList,
) -> DetectResult<ClassLabel> {
  let candidates = decode::decode_candidates(
    tensors,
    frame_width,
    frame_height,
    config.confidence_threshold,
  );
  debug!("置信度过滤后剩余 {} 个候选框", candidates.len());

  let labeled: Vec<_> = candidates
    .into_iter()
    .filter_map(|item| {
      item.map_kind(|class_id| {
        let label = labels.get(class_id);
        if label.is_none() {
          warn!("类别 {} 超出标签列表范围 ({})", class_id, labels.len());
        }
        label
      })
    })
    .collect();

  let result: DetectResult<ClassLabel> =
    nms::nms(labeled, config.score_threshold, config.nms_threshold)
      .into_iter()
      .collect();

  debug!("检测到 {} 个物体", result.len());
  result
}
