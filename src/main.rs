// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 拍照分类设备主程序
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

use std::{thread, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use shanan_classifier::{
  board::HardwareOpener,
  config::DeviceConfig,
  device::Device,
  event::{Event, event_channel},
  input::KeyboardReader,
};

/// 收到中断信号后，超过该时间仍未退出则强制结束
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let config = DeviceConfig::parse();

  info!("相机: {}", config.camera);
  info!("模型: {}", config.model);
  info!("标签表: {}", config.labels.display());
  info!("显示候选数量: {}", config.top_k);

  let (events_tx, events_rx) = event_channel();

  {
    let events = events_tx.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = events.send(Event::Shutdown);
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .context("无法设置 Ctrl-C 处理函数")?;
  }

  let mut opener = HardwareOpener::new(config.clone(), events_tx.clone());
  let mut device = Device::bring_up(&mut opener, config.scroll_period());

  let _keyboard = if config.no_keyboard {
    None
  } else {
    KeyboardReader::spawn_stdin(events_tx.clone())
      .inspect_err(|e| warn!("无法读取终端输入: {}", e))
      .ok()
  };

  device.run(&events_rx);

  let report = device.teardown();
  for failure in report.failures.iter() {
    warn!("{} 未能正常释放: {}", failure.resource, failure.message);
  }

  info!("任务完成，退出");
  Ok(())
}
