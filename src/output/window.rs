// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/window.rs - 窗口显示输出
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

use std::cell::Cell;

use opencv::highgui;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{BgrFrame, resize_by},
  label::WithLabel,
  model::DetectResult,
  output::{Render, draw::Draw},
};

pub const DEFAULT_WINDOW_NAME: &str = "Object Detection";
const ESCAPE_KEY: i32 = 27;
const WAIT_KEY_DELAY_MS: i32 = 1;

#[derive(Error, Debug)]
pub enum WindowOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("显示缩放比例无效: {0}")]
  InvalidScale(String),
  #[error("OpenCV 错误: {0}")]
  OpenCvError(#[from] opencv::Error),
}

/// 窗口参数，从 URL 解析
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
  pub name: String,
  /// 显示前的放大倍数；为空时按帧的缩放比例还原到采集尺寸
  pub display_scale: Option<f64>,
  pub with_score: bool,
}

impl WindowOptions {
  pub fn parse(url: &Url) -> Result<Self, WindowOutputError> {
    if url.scheme() != WindowOutput::SCHEME {
      return Err(WindowOutputError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        WindowOutput::SCHEME,
        url.scheme()
      )));
    }

    let name = crate::decoded_path(url);
    let name = name.trim_start_matches('/').trim();
    let name = if name.is_empty() {
      DEFAULT_WINDOW_NAME.to_string()
    } else {
      name.to_string()
    };

    let display_scale = match crate::query_value(url, "scale") {
      None => None,
      Some(value) => match value.parse::<f64>() {
        Ok(scale) if scale.is_finite() && scale > 0.0 => Some(scale),
        _ => return Err(WindowOutputError::InvalidScale(value)),
      },
    };

    let with_score = url.query_pairs().any(|(k, _)| k == "score");

    Ok(WindowOptions {
      name,
      display_scale,
      with_score,
    })
  }

  fn display_scale_for(&self, frame: &BgrFrame) -> f64 {
    self.display_scale.unwrap_or(1.0 / frame.scale())
  }
}

/// 在命名窗口中显示检测结果；按下 Esc 后请求退出
pub struct WindowOutput {
  options: WindowOptions,
  draw: Draw,
  exit: Cell<bool>,
}

impl FromUrlWithScheme for WindowOutput {
  const SCHEME: &'static str = "window";
}

impl FromUrl for WindowOutput {
  type Error = WindowOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let options = WindowOptions::parse(url)?;
    info!("创建显示窗口: {}", options.name);
    highgui::named_window(&options.name, highgui::WINDOW_AUTOSIZE)?;

    Ok(WindowOutput {
      draw: Draw::default().with_score(options.with_score),
      options,
      exit: Cell::new(false),
    })
  }
}

impl<T: WithLabel> Render<BgrFrame, DetectResult<T>> for WindowOutput {
  type Error = WindowOutputError;

  fn render_result(&self, frame: &BgrFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    let image = self.draw.draw_detection(frame, result)?;
    let image = resize_by(&image, self.options.display_scale_for(frame))?;
    highgui::imshow(&self.options.name, &image)?;

    let key = highgui::wait_key(WAIT_KEY_DELAY_MS)?;
    if key == ESCAPE_KEY {
      debug!("窗口 {} 收到 Esc", self.options.name);
      self.exit.set(true);
    }
    Ok(())
  }

  fn exit_requested(&self) -> bool {
    self.exit.get()
  }
}

impl Drop for WindowOutput {
  fn drop(&mut self) {
    info!("关闭显示窗口: {}", self.options.name);
    if let Err(e) = highgui::destroy_window(&self.options.name) {
      warn!("关闭窗口失败: {}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_window_name() {
    let options = WindowOptions::parse(&Url::parse("window:").unwrap()).unwrap();
    assert_eq!(options.name, DEFAULT_WINDOW_NAME);
    assert_eq!(options.display_scale, None);
    assert!(!options.with_score);
  }

  #[test]
  fn window_name_is_percent_decoded() {
    let options =
      WindowOptions::parse(&Url::parse("window:Object%20Detection?scale=2&score").unwrap()).unwrap();
    assert_eq!(options.name, "Object Detection");
    assert_eq!(options.display_scale, Some(2.0));
    assert!(options.with_score);
  }

  #[test]
  fn invalid_scale_is_rejected() {
    assert!(matches!(
      WindowOptions::parse(&Url::parse("window:main?scale=-1").unwrap()),
      Err(WindowOutputError::InvalidScale(_))
    ));
    for value in ["inf", "NaN", "abc"] {
      let url = Url::parse(&format!("window:main?scale={}", value)).unwrap();
      assert!(matches!(
        WindowOptions::parse(&url),
        Err(WindowOutputError::InvalidScale(_))
      ));
    }
  }

  #[test]
  fn display_scale_restores_capture_size_by_default() {
    use opencv::core::Mat;

    let options = WindowOptions::parse(&Url::parse("window:main").unwrap()).unwrap();
    let frame = BgrFrame::new(Mat::default(), 1, 0, 0.4);
    assert!((options.display_scale_for(&frame) - 2.5).abs() < 1e-9);

    let options = WindowOptions::parse(&Url::parse("window:main?scale=4").unwrap()).unwrap();
    assert_eq!(options.display_scale_for(&frame), 4.0);
  }
}
