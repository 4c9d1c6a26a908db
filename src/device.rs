// 该文件是 Shanan （山南西风） 项目的一部分。
// src/device.rs - 设备生命周期与调度循环
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

//! 设备按固定顺序打开与释放所有硬件资源，并在调度线程上处理事件。
//!
//! 打开顺序：相机 → 推理引擎 → 按钮 → 显示屏。
//! 释放顺序：推理引擎 → 相机 → 按钮 → 显示屏。
//! 相机或推理引擎打不开时设备不可用，但进程继续运行；
//! 按钮或显示屏打不开时只关闭对应功能。

use std::{
  fmt,
  time::{Duration, Instant},
};

use crossbeam_channel::RecvTimeoutError;
use tracing::{error, info, warn};

use crate::{
  display::{CharDisplay, DisplayText},
  event::{Event, EventReceiver, TriggerSource},
  input::{InputController, KeyEvent},
  marquee::DisplayMarquee,
  pipeline::{CaptureService, ClassificationPipeline, InferenceService},
};

pub const READY_BANNER: &str = "RDY";
pub const ERROR_BANNER: &str = "ERR";

/// 由设备独占、在关机时释放的资源
pub trait Release {
  fn release(&mut self) -> anyhow::Result<()>;
}

/// 打开各类硬件资源
pub trait DeviceOpener {
  type Camera: CaptureService + Release;
  type Engine: InferenceService + Release;
  type Display: CharDisplay;

  fn open_camera(&mut self) -> anyhow::Result<Self::Camera>;
  fn open_engine(&mut self) -> anyhow::Result<Self::Engine>;
  /// 每个按钮单独成败
  fn open_buttons(&mut self) -> Vec<anyhow::Result<Box<dyn Release>>>;
  fn open_display(&mut self) -> anyhow::Result<Self::Display>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
  Operational,
  Inoperable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
  Engine,
  Camera,
  Button(usize),
  Display,
}

impl fmt::Display for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Resource::Engine => write!(f, "推理引擎"),
      Resource::Camera => write!(f, "相机"),
      Resource::Button(index) => write!(f, "按钮 {}", index),
      Resource::Display => write!(f, "显示屏"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFailure {
  pub resource: Resource,
  pub message: String,
}

#[derive(Debug, Default)]
pub struct TeardownReport {
  pub failures: Vec<ReleaseFailure>,
}

impl TeardownReport {
  pub fn is_clean(&self) -> bool {
    self.failures.is_empty()
  }

  fn record(&mut self, resource: Resource, error: impl fmt::Display) {
    let message = error.to_string();
    warn!("释放{}失败: {}", resource, message);
    self.failures.push(ReleaseFailure { resource, message });
  }
}

pub struct Device<O: DeviceOpener> {
  camera: Option<O::Camera>,
  engine: Option<O::Engine>,
  buttons: Vec<Box<dyn Release>>,
  marquee: DisplayMarquee<O::Display>,
  pipeline: ClassificationPipeline,
  input: InputController,
  status: DeviceStatus,
}

impl<O: DeviceOpener> Device<O> {
  pub fn bring_up(opener: &mut O, scroll_period: Duration) -> Self {
    info!("打开相机...");
    let camera = opener
      .open_camera()
      .inspect_err(|e| error!("相机打开失败: {:#}", e))
      .ok();

    info!("加载推理引擎...");
    let engine = opener
      .open_engine()
      .inspect_err(|e| error!("推理引擎加载失败: {:#}", e))
      .ok();

    info!("打开按钮...");
    let buttons: Vec<Box<dyn Release>> = opener
      .open_buttons()
      .into_iter()
      .enumerate()
      .filter_map(|(index, button)| {
        button
          .inspect_err(|e| warn!("按钮 {} 打开失败，已禁用: {:#}", index, e))
          .ok()
      })
      .collect();
    if buttons.is_empty() {
      warn!("没有可用的按钮，仅支持键盘触发");
    }

    info!("打开显示屏...");
    let marquee = match opener.open_display().and_then(Self::power_on) {
      Ok(display) => DisplayMarquee::new(display, scroll_period),
      Err(e) => {
        warn!("显示屏不可用，结果只写入日志: {:#}", e);
        DisplayMarquee::detached(scroll_period)
      }
    };

    let status = match (&camera, &engine) {
      (Some(_), Some(_)) => DeviceStatus::Operational,
      (None, _) => DeviceStatus::Inoperable("相机不可用".to_string()),
      (_, None) => DeviceStatus::Inoperable("推理引擎不可用".to_string()),
    };

    let mut device = Self {
      camera,
      engine,
      buttons,
      pipeline: ClassificationPipeline::new(marquee.width()),
      marquee,
      input: InputController::new(),
      status,
    };

    let banner = match &device.status {
      DeviceStatus::Operational => {
        info!("设备就绪");
        READY_BANNER
      }
      DeviceStatus::Inoperable(reason) => {
        error!("设备不可用: {}", reason);
        ERROR_BANNER
      }
    };
    if let Some(text) = DisplayText::unpadded(banner) {
      device.marquee.start(text);
    }
    device
  }

  fn power_on(mut display: O::Display) -> anyhow::Result<O::Display> {
    let powered = display.set_enabled(true).and_then(|_| display.clear());
    if let Err(e) = powered {
      if let Err(close) = display.close() {
        warn!("关闭显示屏失败: {}", close);
      }
      return Err(e.into());
    }
    Ok(display)
  }

  pub fn status(&self) -> &DeviceStatus {
    &self.status
  }

  pub fn pipeline(&self) -> &ClassificationPipeline {
    &self.pipeline
  }

  pub fn marquee(&self) -> &DisplayMarquee<O::Display> {
    &self.marquee
  }

  pub fn input(&self) -> &InputController {
    &self.input
  }

  pub fn button_count(&self) -> usize {
    self.buttons.len()
  }

  /// 处理一个事件，返回是否继续运行
  pub fn handle(&mut self, event: Event) -> bool {
    match event {
      Event::Trigger(source) => self.trigger(source),
      Event::Key(KeyEvent::Quit) => {
        info!("收到退出指令");
        return false;
      }
      Event::Key(key) => match (&self.status, self.camera.as_mut()) {
        (DeviceStatus::Operational, Some(camera)) => {
          self.input.on_key(&key, &mut self.pipeline, camera);
        }
        (status, _) => warn!("设备不可用 ({:?})，忽略按键 {:?}", status, key),
      },
      Event::Captured(outcome) => match self.engine.as_mut() {
        Some(engine) => self.pipeline.on_captured(outcome, engine),
        None => warn!("推理引擎不可用，丢弃拍照结果 {}", outcome.request.cycle()),
      },
      Event::Classified(outcome) => self.pipeline.on_classified(outcome, &mut self.marquee),
      Event::Shutdown => {
        info!("收到关机事件");
        return false;
      }
    }
    true
  }

  fn trigger(&mut self, source: TriggerSource) {
    match (&self.status, self.camera.as_mut()) {
      (DeviceStatus::Operational, Some(camera)) => {
        self.input.on_trigger(source, &mut self.pipeline, camera);
      }
      (status, _) => warn!("设备不可用 ({:?})，忽略{}触发", status, source),
    }
  }

  /// 触发到期的滚动
  pub fn poll_timers(&mut self, now: Instant) -> bool {
    self.marquee.poll(now)
  }

  /// 调度循环：在事件与下一次滚动之间等待，直到关机或所有发送端关闭
  pub fn run(&mut self, events: &EventReceiver) {
    info!("进入调度循环");
    loop {
      let received = match self.marquee.next_due() {
        Some(due) => match events.recv_deadline(due) {
          Ok(event) => Some(event),
          Err(RecvTimeoutError::Timeout) => None,
          Err(RecvTimeoutError::Disconnected) => break,
        },
        None => match events.recv() {
          Ok(event) => Some(event),
          Err(_) => break,
        },
      };

      if let Some(event) = received {
        if !self.handle(event) {
          break;
        }
      }
      self.poll_timers(Instant::now());
    }
    info!("退出调度循环");
  }

  /// 尽力释放全部资源，每个失败都记录在报告里
  pub fn teardown(mut self) -> TeardownReport {
    let mut report = TeardownReport::default();

    if let Some(mut engine) = self.engine.take() {
      info!("释放推理引擎");
      if let Err(e) = engine.release() {
        report.record(Resource::Engine, format!("{:#}", e));
      }
    }

    if let Some(mut camera) = self.camera.take() {
      info!("释放相机");
      if let Err(e) = camera.release() {
        report.record(Resource::Camera, format!("{:#}", e));
      }
    }

    for (index, mut button) in self.buttons.drain(..).enumerate() {
      if let Err(e) = button.release() {
        report.record(Resource::Button(index), format!("{:#}", e));
      }
    }

    // 无论哪一步失败，句柄都随之丢弃
    if let Some(mut display) = self.marquee.take_display() {
      info!("关闭显示屏");
      let closed = display
        .clear()
        .and_then(|_| display.set_enabled(false))
        .and_then(|_| display.close());
      if let Err(e) = closed {
        report.record(Resource::Display, e);
      }
    }

    if report.is_clean() {
      info!("所有资源已释放");
    }
    report
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use anyhow::anyhow;

  use super::*;
  use crate::{
    capture::CaptureError,
    display::DisplayError,
    event::{CaptureRequest, InferenceTicket},
    frame::ClassifierFrame,
    model::InferenceError,
  };

  type Log = Rc<RefCell<Vec<String>>>;

  fn push(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
  }

  struct FakeCamera {
    log: Log,
    fail_release: bool,
  }

  impl CaptureService for FakeCamera {
    fn submit(&mut self, request: CaptureRequest) -> Result<(), CaptureError> {
      push(&self.log, format!("capture {}", request.cycle()));
      Ok(())
    }
  }

  impl Release for FakeCamera {
    fn release(&mut self) -> anyhow::Result<()> {
      push(&self.log, "release camera");
      if self.fail_release {
        return Err(anyhow!("camera busy"));
      }
      Ok(())
    }
  }

  struct FakeEngine {
    log: Log,
  }

  impl InferenceService for FakeEngine {
    fn submit(&mut self, _ticket: InferenceTicket, _frame: ClassifierFrame) -> Result<(), InferenceError> {
      Ok(())
    }
  }

  impl Release for FakeEngine {
    fn release(&mut self) -> anyhow::Result<()> {
      push(&self.log, "release engine");
      Ok(())
    }
  }

  struct FakeButton {
    log: Log,
  }

  impl Release for FakeButton {
    fn release(&mut self) -> anyhow::Result<()> {
      push(&self.log, "release button");
      Ok(())
    }
  }

  struct FakeDisplay {
    log: Log,
    fail_clear_on_teardown: bool,
    enabled: bool,
  }

  impl CharDisplay for FakeDisplay {
    fn width(&self) -> usize {
      4
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), DisplayError> {
      push(&self.log, format!("display enabled={}", enabled));
      self.enabled = enabled;
      Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
      // 运行期间的清屏都成功，只有关机时失败
      if self.fail_clear_on_teardown && self.log.borrow().iter().any(|e| e == "release camera") {
        return Err(DisplayError::IoError(std::io::Error::other("i2c nak")));
      }
      push(&self.log, "display clear");
      Ok(())
    }

    fn show(&mut self, text: &str) -> Result<(), DisplayError> {
      push(&self.log, format!("show {:?}", text));
      Ok(())
    }

    fn close(&mut self) -> Result<(), DisplayError> {
      push(&self.log, "display close");
      Ok(())
    }
  }

  #[derive(Default)]
  struct FakeOpener {
    log: Log,
    camera_missing: bool,
    display_missing: bool,
    fail_camera_release: bool,
    fail_display_clear: bool,
    buttons: usize,
    broken_buttons: usize,
  }

  impl DeviceOpener for FakeOpener {
    type Camera = FakeCamera;
    type Engine = FakeEngine;
    type Display = FakeDisplay;

    fn open_camera(&mut self) -> anyhow::Result<FakeCamera> {
      push(&self.log, "open camera");
      if self.camera_missing {
        return Err(anyhow!("no /dev/video0"));
      }
      Ok(FakeCamera {
        log: self.log.clone(),
        fail_release: self.fail_camera_release,
      })
    }

    fn open_engine(&mut self) -> anyhow::Result<FakeEngine> {
      push(&self.log, "open engine");
      Ok(FakeEngine {
        log: self.log.clone(),
      })
    }

    fn open_buttons(&mut self) -> Vec<anyhow::Result<Box<dyn Release>>> {
      push(&self.log, "open buttons");
      let mut buttons: Vec<anyhow::Result<Box<dyn Release>>> = (0..self.buttons)
        .map(|_| {
          Ok(Box::new(FakeButton {
            log: self.log.clone(),
          }) as Box<dyn Release>)
        })
        .collect();
      buttons.extend((0..self.broken_buttons).map(|_| Err(anyhow!("gpio busy"))));
      buttons
    }

    fn open_display(&mut self) -> anyhow::Result<FakeDisplay> {
      push(&self.log, "open display");
      if self.display_missing {
        return Err(anyhow!("no display on bus"));
      }
      Ok(FakeDisplay {
        log: self.log.clone(),
        fail_clear_on_teardown: self.fail_display_clear,
        enabled: false,
      })
    }
  }

  fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
  }

  #[test]
  fn opens_in_order_and_shows_ready_banner() {
    let mut opener = FakeOpener {
      buttons: 1,
      ..Default::default()
    };
    let device = Device::bring_up(&mut opener, Duration::from_millis(200));

    assert_eq!(device.status(), &DeviceStatus::Operational);
    assert_eq!(
      entries(&opener.log),
      vec![
        "open camera",
        "open engine",
        "open buttons",
        "open display",
        "display enabled=true",
        "display clear",
        "display clear",
        "show \"RDY\"",
      ]
    );
    assert!(device.marquee().display().is_some_and(|d| d.enabled));
    assert!(device.marquee().next_due().is_none());
  }

  #[test]
  fn missing_buttons_and_display_only_degrade() {
    let mut opener = FakeOpener {
      buttons: 1,
      broken_buttons: 2,
      display_missing: true,
      ..Default::default()
    };
    let mut device = Device::bring_up(&mut opener, Duration::from_millis(200));

    assert_eq!(device.status(), &DeviceStatus::Operational);
    assert_eq!(device.button_count(), 1);
    assert!(!device.marquee().has_display());

    assert!(device.handle(Event::Trigger(TriggerSource::Key)));
    assert!(device.pipeline().is_busy());
    assert!(entries(&opener.log).contains(&"capture #1".to_string()));
  }

  #[test]
  fn missing_camera_makes_device_inoperable_but_alive() {
    let mut opener = FakeOpener {
      camera_missing: true,
      ..Default::default()
    };
    let mut device = Device::bring_up(&mut opener, Duration::from_millis(200));

    assert!(matches!(device.status(), DeviceStatus::Inoperable(_)));
    assert!(entries(&opener.log).contains(&"show \"ERR\"".to_string()));

    assert!(device.handle(Event::Trigger(TriggerSource::Button)));
    assert!(device.handle(Event::Key(KeyEvent::Confirm)));
    assert!(!device.pipeline().is_busy());
    assert_eq!(device.input().accepted(), 0);
  }

  #[test]
  fn quit_key_and_shutdown_stop_the_loop() {
    let mut opener = FakeOpener::default();
    let mut device = Device::bring_up(&mut opener, Duration::from_millis(200));
    assert!(device.handle(Event::Key(KeyEvent::Other("x".into()))));
    assert!(!device.handle(Event::Key(KeyEvent::Quit)));
    assert!(!device.handle(Event::Shutdown));
  }

  #[test]
  fn releases_in_order() {
    let mut opener = FakeOpener {
      buttons: 2,
      ..Default::default()
    };
    let device = Device::bring_up(&mut opener, Duration::from_millis(200));
    opener.log.borrow_mut().clear();

    let report = device.teardown();
    assert!(report.is_clean());
    assert_eq!(
      entries(&opener.log),
      vec![
        "release engine",
        "release camera",
        "release button",
        "release button",
        "display clear",
        "display enabled=false",
        "display close",
      ]
    );
  }

  #[test]
  fn display_clear_failure_does_not_block_other_releases() {
    let mut opener = FakeOpener {
      buttons: 1,
      fail_display_clear: true,
      ..Default::default()
    };
    let device = Device::bring_up(&mut opener, Duration::from_millis(200));
    opener.log.borrow_mut().clear();

    let report = device.teardown();
    let log = entries(&opener.log);
    assert!(log.contains(&"release camera".to_string()));
    assert!(log.contains(&"release button".to_string()));
    // 清屏失败后不再继续关闭流程，句柄直接丢弃
    assert!(!log.contains(&"display close".to_string()));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].resource, Resource::Display);
  }

  #[test]
  fn camera_release_failure_is_reported_and_skipped() {
    let mut opener = FakeOpener {
      buttons: 1,
      fail_camera_release: true,
      ..Default::default()
    };
    let device = Device::bring_up(&mut opener, Duration::from_millis(200));
    opener.log.borrow_mut().clear();

    let report = device.teardown();
    assert_eq!(
      report.failures,
      vec![ReleaseFailure {
        resource: Resource::Camera,
        message: "camera busy".to_string(),
      }]
    );
    let log = entries(&opener.log);
    assert!(log.contains(&"release button".to_string()));
    assert!(log.contains(&"display close".to_string()));
  }
}
