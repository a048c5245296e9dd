// 该文件是 Beifeng （北风） 项目的一部分。
// src/task.rs - 推理任务循环
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

use std::{
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 逐帧推理直到输入结束、达到帧数上限、输出端请求退出或收到 Ctrl-C
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  fn reached_frame_limit(&self, frame_index: usize) -> bool {
    self.frame_number.is_some_and(|n| frame_index >= n)
  }
}

/// 安装 Ctrl-C 处理函数；30 秒内未退出则强制结束进程。
/// 每个进程只能安装一次，重复安装时返回错误。
fn interrupt_channel() -> Result<Receiver<()>, ctrlc::Error> {
  let (tx, rx) = mpsc::channel();

  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  Ok(rx)
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = match interrupt_channel() {
      Ok(rx) => Some(rx),
      Err(e) => {
        warn!("无法安装 Ctrl-C 处理函数: {}", e);
        None
      }
    };

    let mut frame_index = 0usize;
    let mut now = Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_index);
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.reached_frame_limit(frame_index) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if output.exit_requested() {
        info!("输出端请求退出，退出任务循环");
        break;
      }
      if rx.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::{Cell, RefCell};

  #[derive(Debug, thiserror::Error)]
  #[error("never")]
  struct Never;

  /// 把输入数字翻倍
  struct Doubler;

  impl Model for Doubler {
    type Input = u32;
    type Output = u32;
    type Error = Never;

    fn infer(&mut self, input: &u32) -> Result<u32, Never> {
      Ok(input * 2)
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<(u32, u32)>>,
    stop_after: Option<usize>,
    rendered: Cell<usize>,
  }

  impl Render<u32, u32> for &Collect {
    type Error = Never;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Never> {
      self.seen.borrow_mut().push((*frame, *result));
      self.rendered.set(self.rendered.get() + 1);
      Ok(())
    }

    fn exit_requested(&self) -> bool {
      self.stop_after.is_some_and(|n| self.rendered.get() >= n)
    }
  }

  #[test]
  fn one_shot_renders_first_frame_only() {
    let output = Collect::default();
    OneShotTask.run_task(vec![3u32, 4].into_iter(), Doubler, &output).unwrap();
    assert_eq!(*output.seen.borrow(), vec![(3, 6)]);
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let output = Collect::default();
    assert!(OneShotTask.run_task(Vec::<u32>::new().into_iter(), Doubler, &output).is_err());
  }

  #[test]
  fn frame_limit_is_inclusive() {
    let task = ContinuousTask::default().with_frame_number(Some(2));
    assert!(!task.reached_frame_limit(1));
    assert!(task.reached_frame_limit(2));
    assert!(!ContinuousTask::default().reached_frame_limit(usize::MAX));
  }

  #[test]
  fn continuous_task_stops_at_frame_limit() {
    let output = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(1u32..10, Doubler, &output)
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![(1, 2), (2, 4)]);
  }

  #[test]
  fn continuous_task_stops_when_output_requests_exit() {
    let output = Collect {
      stop_after: Some(3),
      ..Default::default()
    };
    ContinuousTask::default()
      .run_task(1u32..100, Doubler, &output)
      .unwrap();
    assert_eq!(output.seen.borrow().len(), 3);
  }

  #[test]
  fn continuous_task_drains_finite_input() {
    let output = Collect::default();
    ContinuousTask::default()
      .run_task(vec![5u32, 6].into_iter(), Doubler, &output)
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![(5, 10), (6, 12)]);
  }
}
