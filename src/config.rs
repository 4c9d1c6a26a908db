// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 设备参数配置
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

use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

use clap::Parser;
use url::Url;

use crate::model::Ranking;

/// 拍照分类设备参数配置
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct DeviceConfig {
  /// 相机，例如 v4l2:///dev/video0?width=640&height=480 或 image:///opt/sample.jpg
  #[arg(long, value_name = "CAMERA")]
  pub camera: Url,

  /// RKNN 分类模型，例如 rknn:///opt/mobilenet.rknn?softmax
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 标签表，每行一个标签，顺序与模型输出一致
  #[arg(long, value_name = "FILE")]
  pub labels: PathBuf,

  /// 显示屏，例如 console://stderr 或 file:///run/marquee?width=4
  #[arg(long, value_name = "DISPLAY")]
  pub display: Option<Url>,

  /// 拍照按钮，可重复，例如 gpio://sysfs/16?active_low&debounce_ms=40
  #[arg(long = "button", value_name = "BUTTON")]
  pub buttons: Vec<Url>,

  /// 显示的候选数量，至少为 1
  #[arg(long, value_name = "K", default_value = "2")]
  pub top_k: NonZeroUsize,

  /// 最低置信度，低于该值的候选不显示
  #[arg(long, value_name = "THRESHOLD", default_value_t = 0.0)]
  pub min_confidence: f32,

  /// 跑马灯滚动间隔（毫秒）
  #[arg(long, value_name = "MS", default_value_t = 200)]
  pub scroll_period_ms: u64,

  /// 不从终端读取按键
  #[arg(long)]
  pub no_keyboard: bool,
}

impl DeviceConfig {
  pub fn ranking(&self) -> Ranking {
    Ranking {
      top_k: self.top_k.get(),
      min_confidence: self.min_confidence,
    }
  }

  pub fn scroll_period(&self) -> Duration {
    Duration::from_millis(self.scroll_period_ms.max(1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn applies_defaults() {
    let config = DeviceConfig::try_parse_from([
      "shanan-classifier",
      "--camera",
      "image:///opt/sample.jpg",
      "--model",
      "rknn:///opt/mobilenet.rknn",
      "--labels",
      "/opt/labels.txt",
    ])
    .unwrap();

    assert_eq!(config.ranking(), Ranking::default());
    assert_eq!(config.scroll_period(), Duration::from_millis(200));
    assert!(config.display.is_none());
    assert!(config.buttons.is_empty());
    assert!(!config.no_keyboard);
  }

  #[test]
  fn accepts_repeated_buttons() {
    let config = DeviceConfig::try_parse_from([
      "shanan-classifier",
      "--camera",
      "v4l2:///dev/video0",
      "--model",
      "rknn:///opt/mobilenet.rknn?softmax",
      "--labels",
      "/opt/labels.txt",
      "--display",
      "console://stderr",
      "--button",
      "gpio://sysfs/16?active_low",
      "--button",
      "gpio://sysfs/17",
      "--top-k",
      "3",
      "--no-keyboard",
    ])
    .unwrap();

    assert_eq!(config.buttons.len(), 2);
    assert_eq!(config.ranking().top_k, 3);
    assert!(config.no_keyboard);
  }

  #[test]
  fn rejects_zero_top_k() {
    let err = DeviceConfig::try_parse_from([
      "shanan-classifier",
      "--camera",
      "image:///opt/sample.jpg",
      "--model",
      "rknn:///opt/mobilenet.rknn",
      "--labels",
      "/opt/labels.txt",
      "--top-k",
      "0",
    ])
    .unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
  }

  #[test]
  fn rejects_malformed_urls() {
    assert!(
      DeviceConfig::try_parse_from([
        "shanan-classifier",
        "--camera",
        "not a url",
        "--model",
        "rknn:///m.rknn",
        "--labels",
        "l.txt",
      ])
      .is_err()
    );
  }
}
