// 该文件是 Shanan （山南西风） 项目的一部分。
// src/event.rs - 调度线程事件定义
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

//! 所有硬件回调（按键、拍照完成、推理完成）都被转换成 [`Event`]，
//! 经由同一个通道送到调度线程，由调度线程独占地修改流水线与跑马灯状态。

use std::fmt;

use crossbeam_channel::{Receiver, Sender};

use crate::{capture::CaptureOutcome, input::KeyEvent, model::ClassifyOutcome};

pub type EventSender = Sender<Event>;
pub type EventReceiver = Receiver<Event>;

pub fn event_channel() -> (EventSender, EventReceiver) {
  crossbeam_channel::unbounded()
}

/// 一次 拍照→推理→显示 周期的编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleId(pub(crate) u64);

impl fmt::Display for CycleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// 正在进行的一次拍照请求
///
/// 不可复制：由相机工作线程消费一次，并随 [`CaptureOutcome`] 原样带回。
#[derive(Debug, PartialEq, Eq)]
pub struct CaptureRequest {
  cycle: CycleId,
}

impl CaptureRequest {
  pub(crate) fn new(cycle: CycleId) -> Self {
    Self { cycle }
  }

  pub fn cycle(&self) -> CycleId {
    self.cycle
  }
}

/// 一次推理请求的凭据，语义同 [`CaptureRequest`]
#[derive(Debug, PartialEq, Eq)]
pub struct InferenceTicket {
  cycle: CycleId,
}

impl InferenceTicket {
  pub(crate) fn new(cycle: CycleId) -> Self {
    Self { cycle }
  }

  pub fn cycle(&self) -> CycleId {
    self.cycle
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
  Button,
  Key,
}

impl fmt::Display for TriggerSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TriggerSource::Button => write!(f, "按钮"),
      TriggerSource::Key => write!(f, "键盘"),
    }
  }
}

#[derive(Debug)]
pub enum Event {
  Trigger(TriggerSource),
  Key(KeyEvent),
  Captured(CaptureOutcome),
  Classified(ClassifyOutcome),
  Shutdown,
}
