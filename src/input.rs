// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 按钮与键盘触发
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

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::{
  event::{CycleId, TriggerSource},
  pipeline::{CaptureService, ClassificationPipeline, StartError},
};

mod gpio;
pub use self::gpio::{ButtonHandle, GpioButton, GpioButtonError};

mod keyboard;
pub use self::keyboard::KeyboardReader;

/// 终端上的一行输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
  /// 空行（回车），等同于按下拍照按钮
  Confirm,
  Quit,
  Other(String),
}

impl KeyEvent {
  pub fn from_line(line: &str) -> Self {
    match line.trim() {
      "" => KeyEvent::Confirm,
      "q" | "Q" | "quit" => KeyEvent::Quit,
      other => KeyEvent::Other(other.to_string()),
    }
  }
}

/// 将触发转交给流水线；流水线忙碌时丢弃触发，不排队
#[derive(Debug, Default)]
pub struct InputController {
  accepted: u64,
  dropped: u64,
}

impl InputController {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on_trigger(
    &mut self,
    source: TriggerSource,
    pipeline: &mut ClassificationPipeline,
    camera: &mut impl CaptureService,
  ) -> Option<CycleId> {
    match pipeline.start(camera) {
      Ok(cycle) => {
        self.accepted += 1;
        info!("{}触发，开始周期 {}", source, cycle);
        Some(cycle)
      }
      Err(StartError::Busy(state)) => {
        self.dropped += 1;
        warn!("仍在处理中 ({:?})，忽略本次{}触发", state, source);
        None
      }
      Err(e) => {
        error!("{}触发失败: {}", source, e);
        None
      }
    }
  }

  /// 其余按键只记录，不处理；返回是否已处理
  pub fn on_key(
    &mut self,
    key: &KeyEvent,
    pipeline: &mut ClassificationPipeline,
    camera: &mut impl CaptureService,
  ) -> bool {
    match key {
      KeyEvent::Confirm => {
        self.on_trigger(TriggerSource::Key, pipeline, camera);
        true
      }
      KeyEvent::Quit => false,
      KeyEvent::Other(key) => {
        debug!("未处理的按键: {:?}", key);
        false
      }
    }
  }

  pub fn accepted(&self) -> u64 {
    self.accepted
  }

  pub fn dropped(&self) -> u64 {
    self.dropped
  }
}

/// 电平消抖：新电平持续 `interval` 后才被接受
#[derive(Debug, Clone)]
pub struct Debouncer {
  stable: bool,
  candidate: bool,
  since: Instant,
  interval: Duration,
}

impl Debouncer {
  pub fn new(initial: bool, interval: Duration, now: Instant) -> Self {
    Self {
      stable: initial,
      candidate: initial,
      since: now,
      interval,
    }
  }

  pub fn level(&self) -> bool {
    self.stable
  }

  /// 稳定电平发生变化时返回新电平
  pub fn update(&mut self, level: bool, now: Instant) -> Option<bool> {
    if level != self.candidate {
      self.candidate = level;
      self.since = now;
    }
    if self.candidate != self.stable && now.saturating_duration_since(self.since) >= self.interval {
      self.stable = self.candidate;
      return Some(self.stable);
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{capture::CaptureError, event::CaptureRequest};

  #[derive(Default)]
  struct FakeCamera {
    requests: Vec<CaptureRequest>,
  }

  impl CaptureService for FakeCamera {
    fn submit(&mut self, request: CaptureRequest) -> Result<(), CaptureError> {
      self.requests.push(request);
      Ok(())
    }
  }

  #[test]
  fn parses_key_lines() {
    assert_eq!(KeyEvent::from_line("\n"), KeyEvent::Confirm);
    assert_eq!(KeyEvent::from_line("  "), KeyEvent::Confirm);
    assert_eq!(KeyEvent::from_line("q"), KeyEvent::Quit);
    assert_eq!(KeyEvent::from_line("x"), KeyEvent::Other("x".into()));
  }

  #[test]
  fn drops_triggers_while_busy() {
    let mut controller = InputController::new();
    let mut pipeline = ClassificationPipeline::default();
    let mut camera = FakeCamera::default();

    assert!(
      controller
        .on_trigger(TriggerSource::Button, &mut pipeline, &mut camera)
        .is_some()
    );
    assert!(
      controller
        .on_trigger(TriggerSource::Button, &mut pipeline, &mut camera)
        .is_none()
    );
    assert!(controller.on_key(&KeyEvent::Confirm, &mut pipeline, &mut camera));

    assert_eq!(camera.requests.len(), 1);
    assert_eq!(controller.accepted(), 1);
    assert_eq!(controller.dropped(), 2);
  }

  #[test]
  fn other_keys_are_not_handled() {
    let mut controller = InputController::new();
    let mut pipeline = ClassificationPipeline::default();
    let mut camera = FakeCamera::default();

    assert!(!controller.on_key(&KeyEvent::Other("a".into()), &mut pipeline, &mut camera));
    assert!(camera.requests.is_empty());
    assert!(!pipeline.is_busy());
  }

  #[test]
  fn debouncer_ignores_short_glitches() {
    let t0 = Instant::now();
    let ms = Duration::from_millis;
    let mut debouncer = Debouncer::new(false, ms(40), t0);

    assert_eq!(debouncer.update(true, t0 + ms(10)), None);
    assert_eq!(debouncer.update(false, t0 + ms(20)), None);
    assert_eq!(debouncer.update(false, t0 + ms(100)), None);
    assert!(!debouncer.level());

    assert_eq!(debouncer.update(true, t0 + ms(200)), None);
    assert_eq!(debouncer.update(true, t0 + ms(230)), None);
    assert_eq!(debouncer.update(true, t0 + ms(240)), Some(true));
    assert_eq!(debouncer.update(true, t0 + ms(300)), None);
    assert_eq!(debouncer.update(false, t0 + ms(310)), None);
    assert_eq!(debouncer.update(false, t0 + ms(350)), Some(false));
  }
}
