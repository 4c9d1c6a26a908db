// 该文件是 Shanan （山南西风） 项目的一部分。
// src/camera/image_file.rs - 静态图片相机
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

use std::path::PathBuf;

use image::{ImageReader, RgbImage};
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  camera::{Camera, CameraError},
};

/// 每次拍照都重新读取同一个图片文件，用于没有摄像头的开发板
pub struct ImageFileCamera {
  path: PathBuf,
}

impl ImageFileCamera {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl FromUrlWithScheme for ImageFileCamera {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileCamera {
  type Error = CameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CameraError::SchemeMismatch);
    }

    let path = PathBuf::from(url.path());
    if !path.is_file() {
      return Err(CameraError::IoError(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("图片不存在: {}", path.display()),
      )));
    }
    Ok(Self::new(path))
  }
}

impl Camera for ImageFileCamera {
  fn with_frame<T>(&mut self, f: impl FnOnce(&RgbImage) -> T) -> Result<T, CameraError> {
    debug!("读取图片: {}", self.path.display());
    let image = ImageReader::open(&self.path)?.decode()?.into_rgb8();
    Ok(f(&image))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_is_rejected_at_open() {
    let url = Url::parse("image:///nonexistent/sampledog_224x224.png").unwrap();
    assert!(matches!(
      ImageFileCamera::from_url(&url),
      Err(CameraError::IoError(_))
    ));
  }

  #[test]
  fn reads_frame_from_disk() {
    let path = std::env::temp_dir().join(format!("shanan-camera-{}.png", std::process::id()));
    RgbImage::from_pixel(8, 6, image::Rgb([10, 20, 30]))
      .save(&path)
      .unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let mut camera = ImageFileCamera::from_url(&url).unwrap();
    let dims = camera.with_frame(|image| image.dimensions()).unwrap();
    assert_eq!(dims, (8, 6));

    std::fs::remove_file(&path).unwrap();
    assert!(camera.with_frame(|_| ()).is_err());
  }
}
