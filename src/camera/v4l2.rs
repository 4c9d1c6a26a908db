// 该文件是 Shanan （山南西风） 项目的一部分。
// src/camera/v4l2.rs - V4L2 单次拍照相机
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

use image::RgbImage;
use tracing::{debug, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  camera::{Camera, CameraError},
  utils::query_map,
};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
/// 自动曝光需要几帧才能稳定
const DEFAULT_WARMUP_FRAMES: usize = 3;

/// V4L2 摄像头
///
/// 每次拍照单独建立 mmap 流，取到一帧后随流一起释放缓冲区，
/// 空闲时不占用驱动缓冲区。
pub struct V4l2Camera {
  device: Device,
  width: u32,
  height: u32,
  warmup: usize,
}

impl FromUrlWithScheme for V4l2Camera {
  const SCHEME: &'static str = "v4l2";
}

impl FromUrl for V4l2Camera {
  type Error = CameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(CameraError::SchemeMismatch);
    }

    let query = query_map(url);
    let width = query
      .get("width")
      .and_then(|v| v.parse::<u32>().ok())
      .unwrap_or(DEFAULT_WIDTH);
    let height = query
      .get("height")
      .and_then(|v| v.parse::<u32>().ok())
      .unwrap_or(DEFAULT_HEIGHT);
    let warmup = query
      .get("warmup")
      .and_then(|v| v.parse::<usize>().ok())
      .unwrap_or(DEFAULT_WARMUP_FRAMES);

    Self::open(url.path(), width, height, warmup)
  }
}

impl V4l2Camera {
  pub fn open(device_path: &str, width: u32, height: u32, warmup: usize) -> Result<Self, CameraError> {
    info!("打开摄像头: {}", device_path);
    let device = Device::with_path(device_path)?;

    let mut format = device.format()?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format)?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(CameraError::UnsupportedFormat(format.fourcc.to_string()));
    }
    info!("摄像头格式: {}x{} {}", format.width, format.height, format.fourcc);

    Ok(Self {
      device,
      width: format.width,
      height: format.height,
      warmup,
    })
  }

  /// 将 YUYV 格式转换为 RGB
  fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);

    for chunk in yuyv.chunks_exact(4) {
      let y0 = chunk[0] as f32;
      let u = chunk[1] as f32 - 128.0;
      let y1 = chunk[2] as f32;
      let v = chunk[3] as f32 - 128.0;

      for y in [y0, y1] {
        let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
        let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
        let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
        rgb.extend_from_slice(&[r, g, b]);
      }
    }

    rgb
  }
}

impl Camera for V4l2Camera {
  fn with_frame<T>(&mut self, f: impl FnOnce(&RgbImage) -> T) -> Result<T, CameraError> {
    let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, 2)?;

    for _ in 0..self.warmup {
      stream.next()?;
    }

    let (buffer, meta) = stream.next()?;
    debug!("取得第 {} 帧, {} 字节", meta.sequence, buffer.len());

    let expected = (self.width * self.height * 2) as usize;
    if buffer.len() < expected {
      return Err(CameraError::BadFrame(format!(
        "YUYV 帧长度不足: 期望 {}, 实际 {}",
        expected,
        buffer.len()
      )));
    }

    let rgb = Self::yuyv_to_rgb(&buffer[..expected], self.width, self.height);
    let image = RgbImage::from_raw(self.width, self.height, rgb)
      .ok_or_else(|| CameraError::BadFrame("无法创建 RGB 图像".to_string()))?;

    // stream 在返回时析构，驱动缓冲区随之归还
    Ok(f(&image))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn converts_grey_yuyv_pair() {
    let rgb = V4l2Camera::yuyv_to_rgb(&[128, 128, 64, 128], 2, 1);
    assert_eq!(rgb, vec![128, 128, 128, 64, 64, 64]);
  }
}
