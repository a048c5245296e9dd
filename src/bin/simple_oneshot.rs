// 该文件是 Beifeng （北风） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像检测
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use beifeng::{
  FromUrl,
  config::DetectionConfig,
  input::InputWrapper,
  model::DarknetYoloBuilder,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

/// Beifeng 单帧检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// Darknet 模型目录
  #[arg(long, value_name = "MODEL", default_value = "darknet:./detection")]
  pub model: Url,
  /// 输入来源，如 `image:./street.jpg`
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出目标，如 `image:./street-detected.png?score`
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[command(flatten)]
  pub detection: DetectionConfig,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let model = DarknetYoloBuilder::from_url(&args.model)?
    .config(args.detection)
    .build()?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask.run_task(input, model, output)?;

  Ok(())
}
