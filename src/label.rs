// 该文件是 Beifeng （北风） 项目的一部分。
// src/label.rs - 类别标签列表
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

use std::{path::Path, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("标签文件读取失败 {0}: {1}")]
  IoError(String, std::io::Error),
  #[error("标签文件为空: {0}")]
  Empty(String),
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
}

/// 检测类别：标签列表中的下标及其名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
  id: u32,
  name: Arc<str>,
}

impl ClassLabel {
  pub fn new(id: u32, name: impl Into<Arc<str>>) -> Self {
    Self {
      id,
      name: name.into(),
    }
  }
}

impl WithLabel for ClassLabel {
  fn to_label_str(&self) -> String {
    self.name.to_string()
  }

  fn to_label_id(&self) -> u32 {
    self.id
  }
}

/// 按行排列的类别名称，启动时加载一次，之后只读
#[derive(Debug, Clone)]
pub struct LabelList {
  names: Box<[Arc<str>]>,
}

impl LabelList {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let text = std::fs::read_to_string(path)
      .map_err(|e| LabelError::IoError(path.display().to_string(), e))?;
    let labels = Self::parse(&text);
    if labels.is_empty() {
      return Err(LabelError::Empty(path.display().to_string()));
    }
    debug!("共加载 {} 个类别", labels.len());
    Ok(labels)
  }

  /// 每行一个名称；去掉行尾的 `\r`，忽略末尾的空行
  pub fn parse(text: &str) -> Self {
    let mut names: Vec<Arc<str>> = text
      .lines()
      .map(|line| Arc::from(line.trim_end_matches('\r')))
      .collect();
    while names.last().is_some_and(|name| name.trim().is_empty()) {
      names.pop();
    }
    Self {
      names: names.into_boxed_slice(),
    }
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: usize) -> Option<ClassLabel> {
    self
      .names
      .get(class_id)
      .map(|name| ClassLabel::new(class_id as u32, name.clone()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn parse_drops_trailing_blank_lines() {
    let labels = LabelList::parse("person\r\nbicycle\ncar\n\n\n");
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.get(0).unwrap().to_label_str(), "person");
    assert_eq!(labels.get(1).unwrap().to_label_str(), "bicycle");
    assert_eq!(labels.get(2).unwrap().to_label_id(), 2);
    assert!(labels.get(3).is_none());
  }

  #[test]
  fn load_rejects_empty_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file).unwrap();
    assert!(matches!(
      LabelList::load(file.path()),
      Err(LabelError::Empty(_))
    ));
  }

  #[test]
  fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      LabelList::load(dir.path().join("coco.names")),
      Err(LabelError::IoError(_, _))
    ));
  }

  #[test]
  fn load_reads_names_in_order() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "cat\ndog\n").unwrap();
    let labels = LabelList::load(file.path()).unwrap();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels.get(1).unwrap(), ClassLabel::new(1, "dog"));
  }
}
