// 该文件是 Shanan （山南西风） 项目的一部分。
// src/board.rs - 开发板硬件资源
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

use anyhow::{Context, anyhow};
use tracing::info;

use crate::{
  FromUrl,
  camera::CameraWrapper,
  capture::CaptureWorker,
  config::DeviceConfig,
  device::{DeviceOpener, Release},
  display::DisplayWrapper,
  event::EventSender,
  input::GpioButton,
  model::InferenceWorker,
};

/// 按命令行配置打开真实硬件
pub struct HardwareOpener {
  config: DeviceConfig,
  events: EventSender,
}

impl HardwareOpener {
  pub fn new(config: DeviceConfig, events: EventSender) -> Self {
    Self { config, events }
  }
}

impl DeviceOpener for HardwareOpener {
  type Camera = CaptureWorker;
  type Engine = InferenceWorker;
  type Display = DisplayWrapper;

  fn open_camera(&mut self) -> anyhow::Result<CaptureWorker> {
    let url = self.config.camera.clone();
    info!("相机: {}", url);
    CaptureWorker::spawn(
      move || CameraWrapper::from_url(&url).with_context(|| format!("无法打开相机 {}", url)),
      self.events.clone(),
    )
  }

  #[cfg(feature = "rknn_classifier")]
  fn open_engine(&mut self) -> anyhow::Result<InferenceWorker> {
    use crate::model::{LabelTable, RknnClassifierBuilder};

    let url = self.config.model.clone();
    let labels = LabelTable::from_file(&self.config.labels)?;
    let ranking = self.config.ranking();
    info!("模型: {}, 标签数量: {}", url, labels.len());

    InferenceWorker::spawn(
      move || {
        RknnClassifierBuilder::from_url(&url)
          .and_then(|builder| builder.labels(labels).ranking(ranking).build())
          .map_err(|e| anyhow!("无法加载模型 {}: {}", url, e))
      },
      self.events.clone(),
    )
  }

  #[cfg(not(feature = "rknn_classifier"))]
  fn open_engine(&mut self) -> anyhow::Result<InferenceWorker> {
    Err(anyhow!(
      "未启用推理引擎 (rknn_classifier)，无法加载 {}",
      self.config.model
    ))
  }

  fn open_buttons(&mut self) -> Vec<anyhow::Result<Box<dyn Release>>> {
    self
      .config
      .buttons
      .iter()
      .map(|url| {
        let button = GpioButton::from_url(url)?
          .spawn(self.events.clone())
          .with_context(|| format!("无法打开按钮 {}", url))?;
        Ok(Box::new(button) as Box<dyn Release>)
      })
      .collect()
  }

  fn open_display(&mut self) -> anyhow::Result<DisplayWrapper> {
    let url = self.config.display.as_ref().ok_or_else(|| anyhow!("未配置显示屏"))?;
    info!("显示屏: {}", url);
    DisplayWrapper::from_url(url).with_context(|| format!("无法打开显示屏 {}", url))
  }
}
