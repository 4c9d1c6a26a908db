// 该文件是 Shanan （山南西风） 项目的一部分。
// src/marquee.rs - 跑马灯滚动显示
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

//! 在固定宽度的显示屏上滚动显示较长的文本。
//!
//! 跑马灯自己持有下一次滚动的计划（[`ScheduledTick`]），调度线程只负责
//! 在到期时调用 [`DisplayMarquee::poll`]。每次 [`DisplayMarquee::start`]
//! 都会先作废上一条滚动链，所以同一时刻最多只有一个待触发的滚动。

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
  display::{CharDisplay, DISPLAY_WIDTH, DisplayText},
  pipeline::Presenter,
};

pub const SCROLL_PERIOD: Duration = Duration::from_millis(200);

/// 标识一条滚动链，`start` 之后旧链的凭据全部失效
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken {
  generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTick {
  pub token: TickToken,
  pub due: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarqueeState {
  Stopped,
  Scrolling,
}

pub struct DisplayMarquee<D> {
  display: Option<D>,
  width: usize,
  period: Duration,
  text: Option<DisplayText>,
  window_start: usize,
  state: MarqueeState,
  generation: u64,
  pending: Option<ScheduledTick>,
}

impl<D: CharDisplay> DisplayMarquee<D> {
  pub fn new(display: D, period: Duration) -> Self {
    let width = display.width();
    Self::build(Some(display), width, period)
  }

  /// 没有显示屏时只记录日志
  pub fn detached(period: Duration) -> Self {
    Self::build(None, DISPLAY_WIDTH, period)
  }

  fn build(display: Option<D>, width: usize, period: Duration) -> Self {
    Self {
      display,
      width,
      period,
      text: None,
      window_start: 0,
      state: MarqueeState::Stopped,
      generation: 0,
      pending: None,
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn period(&self) -> Duration {
    self.period
  }

  pub fn state(&self) -> MarqueeState {
    self.state
  }

  pub fn window_start(&self) -> usize {
    self.window_start
  }

  pub fn text(&self) -> Option<&DisplayText> {
    self.text.as_ref()
  }

  pub fn has_display(&self) -> bool {
    self.display.is_some()
  }

  pub fn display(&self) -> Option<&D> {
    self.display.as_ref()
  }

  pub fn pending(&self) -> Option<ScheduledTick> {
    self.pending
  }

  pub fn next_due(&self) -> Option<Instant> {
    self.pending.map(|tick| tick.due)
  }

  pub fn start(&mut self, text: DisplayText) {
    self.start_at(text, Instant::now());
  }

  pub fn start_at(&mut self, text: DisplayText, now: Instant) {
    self.cancel();
    self.window_start = 0;

    let Some(display) = self.display.as_mut() else {
      info!("显示屏不可用，结果: {}", text.to_string().trim());
      self.state = MarqueeState::Stopped;
      self.text = Some(text);
      return;
    };

    if let Err(e) = display.clear() {
      warn!("清空显示屏失败: {}", e);
    }

    if text.len() <= self.width {
      self.state = MarqueeState::Stopped;
      self.write(&text.to_string());
    } else {
      self.state = MarqueeState::Scrolling;
      self.write(&text.window(0, self.width));
      self.pending = Some(ScheduledTick {
        token: TickToken {
          generation: self.generation,
        },
        due: now + self.period,
      });
    }
    self.text = Some(text);
  }

  /// 推进一格并写出新窗口，然后安排下一次滚动
  ///
  /// 过期（被新的 `start` 取代）的凭据直接忽略，返回 `false`。
  pub fn tick(&mut self, token: TickToken, now: Instant) -> bool {
    if self.state != MarqueeState::Scrolling || token.generation != self.generation {
      debug!("忽略过期的滚动");
      return false;
    }
    let Some(text) = self.text.as_ref() else {
      return false;
    };

    // 窗口始终完整落在文本内，末尾的留白滚完后回到开头
    let positions = text.len() - self.width + 1;
    self.window_start = (self.window_start + 1) % positions;
    let window = text.window(self.window_start, self.width);
    self.write(&window);

    self.pending = Some(ScheduledTick {
      token,
      due: now + self.period,
    });
    true
  }

  /// 触发所有已到期的滚动，返回是否有滚动发生
  pub fn poll(&mut self, now: Instant) -> bool {
    match self.pending {
      Some(tick) if tick.due <= now => {
        self.pending = None;
        self.tick(tick.token, now)
      }
      _ => false,
    }
  }

  pub fn stop(&mut self) {
    self.cancel();
    self.state = MarqueeState::Stopped;
  }

  /// 停止滚动并交还显示屏句柄，由设备生命周期负责关闭
  pub fn take_display(&mut self) -> Option<D> {
    self.stop();
    self.display.take()
  }

  fn cancel(&mut self) {
    if self.pending.take().is_some() {
      debug!("取消待触发的滚动");
    }
    self.generation = self.generation.wrapping_add(1);
  }

  fn write(&mut self, cells: &str) {
    if let Some(display) = self.display.as_mut() {
      if let Err(e) = display.show(cells) {
        warn!("写入显示屏失败: {}", e);
      }
    }
  }
}

impl<D: CharDisplay> Presenter for DisplayMarquee<D> {
  fn present(&mut self, text: DisplayText) {
    self.start(text);
  }
}
