// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 拍照→推理→显示 流水线
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

//! 流水线状态机：`Idle → Capturing → Inferring → Presenting → Idle`。
//!
//! 忙碌标志就是“状态不为 `Idle`”，只能由调度线程通过 `&mut self` 修改，
//! 因此检查与置位天然是同一步。显示动画交给 [`Presenter`] 后立即回到
//! `Idle`，滚动期间可以开始新的拍照。

use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  capture::{CaptureError, CaptureOutcome},
  display::{DISPLAY_WIDTH, DisplayText},
  event::{CaptureRequest, CycleId, InferenceTicket},
  frame::ClassifierFrame,
  model::{ClassifyOutcome, InferenceError},
};

/// 异步拍照：结果稍后以 [`CaptureOutcome`] 送回调度线程
pub trait CaptureService {
  fn submit(&mut self, request: CaptureRequest) -> Result<(), CaptureError>;
}

/// 异步推理：结果稍后以 [`ClassifyOutcome`] 送回调度线程
pub trait InferenceService {
  fn submit(&mut self, ticket: InferenceTicket, frame: ClassifierFrame) -> Result<(), InferenceError>;
}

pub trait Presenter {
  fn present(&mut self, text: DisplayText);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
  Idle,
  Capturing(CycleId),
  Inferring(CycleId),
  Presenting(CycleId),
}

#[derive(Error, Debug)]
pub enum StartError {
  #[error("流水线忙碌: {0:?}")]
  Busy(PipelineState),
  #[error("无法发起拍照: {0}")]
  CaptureUnavailable(CaptureError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
  pub started: u64,
  pub completed: u64,
  pub aborted: u64,
}

pub struct ClassificationPipeline {
  state: PipelineState,
  next_cycle: u64,
  padding: usize,
  stats: CycleStats,
}

impl Default for ClassificationPipeline {
  fn default() -> Self {
    Self::new(DISPLAY_WIDTH)
  }
}

impl ClassificationPipeline {
  /// `padding` 为结果文本两侧的空白单元数，通常等于显示屏宽度
  pub fn new(padding: usize) -> Self {
    Self {
      state: PipelineState::Idle,
      next_cycle: 0,
      padding,
      stats: CycleStats::default(),
    }
  }

  pub fn state(&self) -> PipelineState {
    self.state
  }

  pub fn is_busy(&self) -> bool {
    self.state != PipelineState::Idle
  }

  pub fn stats(&self) -> CycleStats {
    self.stats
  }

  /// 忙碌时不产生任何副作用，直接拒绝
  pub fn start(&mut self, camera: &mut impl CaptureService) -> Result<CycleId, StartError> {
    if self.is_busy() {
      return Err(StartError::Busy(self.state));
    }

    self.next_cycle += 1;
    let cycle = CycleId(self.next_cycle);
    self.state = PipelineState::Capturing(cycle);
    self.stats.started += 1;

    if let Err(e) = camera.submit(CaptureRequest::new(cycle)) {
      error!("周期 {} 无法发起拍照: {}", cycle, e);
      self.abort(cycle);
      return Err(StartError::CaptureUnavailable(e));
    }
    info!("周期 {} 开始拍照", cycle);
    Ok(cycle)
  }

  pub fn on_captured(&mut self, outcome: CaptureOutcome, engine: &mut impl InferenceService) {
    let cycle = outcome.request.cycle();
    if self.state != PipelineState::Capturing(cycle) {
      warn!("忽略不属于当前周期的拍照结果 {} (当前状态 {:?})", cycle, self.state);
      return;
    }

    let frame = match outcome.result {
      Ok(frame) => frame,
      Err(e) => {
        error!("周期 {} 拍照失败: {}", cycle, e);
        self.abort(cycle);
        return;
      }
    };

    self.state = PipelineState::Inferring(cycle);
    if let Err(e) = engine.submit(InferenceTicket::new(cycle), frame) {
      error!("周期 {} 无法提交推理: {}", cycle, e);
      self.abort(cycle);
    }
  }

  pub fn on_classified(&mut self, outcome: ClassifyOutcome, presenter: &mut impl Presenter) {
    let cycle = outcome.ticket.cycle();
    if self.state != PipelineState::Inferring(cycle) {
      warn!("忽略不属于当前周期的推理结果 {} (当前状态 {:?})", cycle, self.state);
      return;
    }

    let result = match outcome.result {
      Ok(result) => result,
      Err(e) => {
        error!("周期 {} 推理失败: {}", cycle, e);
        self.abort(cycle);
        return;
      }
    };

    self.state = PipelineState::Presenting(cycle);
    for item in result.items.iter() {
      info!("  - {}: {:.2}%", item.label, item.score * 100.0);
    }
    let text = DisplayText::from_result(&result, self.padding);
    info!("周期 {} 结果: {}", cycle, text.to_string().trim());
    presenter.present(text);

    // 动画独立运行，不占用忙碌标志
    self.state = PipelineState::Idle;
    self.stats.completed += 1;
  }

  fn abort(&mut self, cycle: CycleId) {
    warn!("周期 {} 中止，回到空闲状态", cycle);
    self.state = PipelineState::Idle;
    self.stats.aborted += 1;
  }
}
