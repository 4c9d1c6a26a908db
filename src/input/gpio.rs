// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/gpio.rs - sysfs GPIO 按钮
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
  fs,
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread::{self, JoinHandle},
  time::{Duration, Instant},
};

use anyhow::anyhow;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  device::Release,
  event::{Event, EventSender, TriggerSource},
  input::Debouncer,
  utils::{panic_message, query_map},
};

const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(40);
const DEFAULT_POLL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum GpioButtonError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无效的 GPIO 编号: {0}")]
  InvalidPin(String),
  #[error("无法访问 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("无法识别的电平: {0:?}")]
  InvalidLevel(String),
  #[error("无法创建按钮线程: {0}")]
  Spawn(std::io::Error),
}

/// 轮询 sysfs `value` 文件的按钮
///
/// - `gpio://sysfs/17?active_low&debounce_ms=40&poll_ms=10`：按编号导出并读取
///   `/sys/class/gpio/gpio17/value`
/// - `gpio:///path/to/value`：直接读取给定的电平文件
pub struct GpioButton {
  pin: Option<u32>,
  value_path: PathBuf,
  active_low: bool,
  debounce: Duration,
  poll: Duration,
}

impl FromUrlWithScheme for GpioButton {
  const SCHEME: &'static str = "gpio";
}

impl FromUrl for GpioButton {
  type Error = GpioButtonError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GpioButtonError::SchemeMismatch);
    }

    let (pin, value_path) = match url.host_str() {
      Some("sysfs") => {
        let raw = url.path().trim_start_matches('/');
        let pin = raw
          .parse::<u32>()
          .map_err(|_| GpioButtonError::InvalidPin(raw.to_string()))?;
        let value_path = Path::new(SYSFS_GPIO_ROOT)
          .join(format!("gpio{}", pin))
          .join("value");
        (Some(pin), value_path)
      }
      _ => (None, PathBuf::from(url.path())),
    };

    let query = query_map(url);
    let millis = |key: &str, default: Duration| {
      query
        .get(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
    };

    Ok(Self {
      pin,
      value_path,
      active_low: query.contains_key("active_low"),
      debounce: millis("debounce_ms", DEFAULT_DEBOUNCE),
      poll: millis("poll_ms", DEFAULT_POLL),
    })
  }
}

impl GpioButton {
  pub fn value_path(&self) -> &Path {
    &self.value_path
  }

  /// 按编号配置时，导出引脚并设为输入
  fn export(&self) -> Result<(), GpioButtonError> {
    let Some(pin) = self.pin else {
      return Ok(());
    };
    if self.value_path.exists() {
      return Ok(());
    }

    let root = Path::new(SYSFS_GPIO_ROOT);
    write_sysfs(&root.join("export"), &pin.to_string())?;
    write_sysfs(&root.join(format!("gpio{}", pin)).join("direction"), "in")?;
    info!("已导出 GPIO {}", pin);
    Ok(())
  }

  fn read_pressed(&self) -> Result<bool, GpioButtonError> {
    let raw = fs::read_to_string(&self.value_path).map_err(|source| GpioButtonError::Io {
      path: self.value_path.clone(),
      source,
    })?;
    let high = match raw.trim() {
      "1" => true,
      "0" => false,
      other => return Err(GpioButtonError::InvalidLevel(other.to_string())),
    };
    Ok(high != self.active_low)
  }

  /// 开始轮询，按下沿以 [`Event::Trigger`] 送出
  pub fn spawn(self, events: EventSender) -> Result<ButtonHandle, GpioButtonError> {
    self.export()?;
    let initial = self.read_pressed()?;
    info!(
      "按钮就绪: {} (低电平有效: {}, 消抖: {:?})",
      self.value_path.display(),
      self.active_low,
      self.debounce
    );

    let stop = Arc::new(AtomicBool::new(false));
    let name = self.value_path.display().to_string();
    let handle = {
      let stop = stop.clone();
      thread::Builder::new()
        .name("button".to_string())
        .spawn(move || self.poll_loop(initial, &stop, &events))
        .map_err(GpioButtonError::Spawn)?
    };

    Ok(ButtonHandle {
      name,
      stop,
      handle: Some(handle),
    })
  }

  fn poll_loop(&self, initial: bool, stop: &AtomicBool, events: &EventSender) {
    let mut debouncer = Debouncer::new(initial, self.debounce, Instant::now());
    let mut failing = false;

    while !stop.load(Ordering::Relaxed) {
      thread::sleep(self.poll);
      match self.read_pressed() {
        Ok(pressed) => {
          failing = false;
          if debouncer.update(pressed, Instant::now()) == Some(true)
            && events.send(Event::Trigger(TriggerSource::Button)).is_err()
          {
            warn!("调度线程已关闭，按钮线程退出");
            break;
          }
        }
        Err(e) => {
          if !failing {
            warn!("读取按钮失败: {}", e);
          }
          failing = true;
        }
      }
    }
  }
}

fn write_sysfs(path: &Path, value: &str) -> Result<(), GpioButtonError> {
  fs::write(path, value).map_err(|source| GpioButtonError::Io {
    path: path.to_path_buf(),
    source,
  })
}

/// 正在轮询的按钮
pub struct ButtonHandle {
  name: String,
  stop: Arc<AtomicBool>,
  handle: Option<JoinHandle<()>>,
}

impl Release for ButtonHandle {
  fn release(&mut self) -> anyhow::Result<()> {
    self.stop.store(true, Ordering::Relaxed);
    if let Some(handle) = self.handle.take() {
      handle.join().map_err(|payload| {
        anyhow!(
          "按钮线程 {} 异常退出: {}",
          self.name,
          panic_message(payload.as_ref())
        )
      })?;
      info!("按钮已释放: {}", self.name);
    }
    Ok(())
  }
}

impl Drop for ButtonHandle {
  fn drop(&mut self) {
    if let Err(e) = self.release() {
      warn!("{:#}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn level_file(tag: &str, level: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("shanan-gpio-{}-{}", tag, std::process::id()));
    fs::write(&path, level).unwrap();
    path
  }

  #[test]
  fn parses_sysfs_pin() {
    let url = Url::parse("gpio://sysfs/17?active_low&debounce_ms=25").unwrap();
    let button = GpioButton::from_url(&url).unwrap();
    assert_eq!(button.pin, Some(17));
    assert_eq!(button.value_path(), Path::new("/sys/class/gpio/gpio17/value"));
    assert!(button.active_low);
    assert_eq!(button.debounce, Duration::from_millis(25));
    assert_eq!(button.poll, DEFAULT_POLL);
  }

  #[test]
  fn rejects_bad_pin_and_scheme() {
    let url = Url::parse("gpio://sysfs/abc").unwrap();
    assert!(matches!(
      GpioButton::from_url(&url),
      Err(GpioButtonError::InvalidPin(_))
    ));
    let url = Url::parse("console://stdout").unwrap();
    assert!(matches!(
      GpioButton::from_url(&url),
      Err(GpioButtonError::SchemeMismatch)
    ));
  }

  #[test]
  fn reads_active_low_level() {
    let path = level_file("active-low", "0\n");
    let url = Url::parse(&format!("gpio://{}?active_low", path.display())).unwrap();
    let button = GpioButton::from_url(&url).unwrap();
    assert!(button.read_pressed().unwrap());

    fs::write(&path, "x").unwrap();
    assert!(matches!(
      button.read_pressed(),
      Err(GpioButtonError::InvalidLevel(_))
    ));
    fs::remove_file(&path).unwrap();
  }

  #[test]
  fn press_posts_one_trigger() {
    let path = level_file("press", "0");
    let url = Url::parse(&format!("gpio://{}?debounce_ms=0&poll_ms=1", path.display())).unwrap();
    let (tx, rx) = crate::event::event_channel();
    let mut handle = GpioButton::from_url(&url).unwrap().spawn(tx).unwrap();

    fs::write(&path, "1").unwrap();
    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(event, Event::Trigger(TriggerSource::Button)));

    handle.release().unwrap();
    assert!(rx.try_recv().is_err());
    fs::remove_file(&path).unwrap();
  }

  #[test]
  fn missing_value_file_fails_at_spawn() {
    let url = Url::parse("gpio:///nonexistent/gpio/value").unwrap();
    let (tx, _rx) = crate::event::event_channel();
    assert!(matches!(
      GpioButton::from_url(&url).unwrap().spawn(tx),
      Err(GpioButtonError::Io { .. })
    ));
  }
}
