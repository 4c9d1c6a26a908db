// 该文件是 Shanan （山南西风） 项目的一部分。
// src/camera.rs - 相机驱动
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
use thiserror::Error;
use url::Url;

use crate::FromUrl;

/// 单次拍照的相机驱动
///
/// 驱动缓冲区只在 `with_frame` 调用期间有效，闭包返回（或 panic）后立即释放。
pub trait Camera {
  fn with_frame<T>(&mut self, f: impl FnOnce(&RgbImage) -> T) -> Result<T, CameraError>;

  fn shut_down(&mut self) -> Result<(), CameraError> {
    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum CameraError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("不支持的像素格式: {0}")]
  UnsupportedFormat(String),
  #[error("帧数据错误: {0}")]
  BadFrame(String),
}

#[cfg(feature = "image_file_camera")]
mod image_file;
#[cfg(feature = "image_file_camera")]
pub use self::image_file::ImageFileCamera;

#[cfg(feature = "v4l2_camera")]
mod v4l2;
#[cfg(feature = "v4l2_camera")]
pub use self::v4l2::V4l2Camera;

pub enum CameraWrapper {
  #[cfg(feature = "image_file_camera")]
  ImageFile(ImageFileCamera),
  #[cfg(feature = "v4l2_camera")]
  V4l2(V4l2Camera),
}

impl FromUrl for CameraWrapper {
  type Error = CameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "image_file_camera")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileCamera::SCHEME {
        return Ok(CameraWrapper::ImageFile(ImageFileCamera::from_url(url)?));
      }
    }
    #[cfg(feature = "v4l2_camera")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4l2Camera::SCHEME {
        return Ok(CameraWrapper::V4l2(V4l2Camera::from_url(url)?));
      }
    }
    Err(CameraError::SchemeMismatch)
  }
}

impl Camera for CameraWrapper {
  fn with_frame<T>(&mut self, f: impl FnOnce(&RgbImage) -> T) -> Result<T, CameraError> {
    match self {
      #[cfg(feature = "image_file_camera")]
      CameraWrapper::ImageFile(camera) => camera.with_frame(f),
      #[cfg(feature = "v4l2_camera")]
      CameraWrapper::V4l2(camera) => camera.with_frame(f),
    }
  }

  fn shut_down(&mut self) -> Result<(), CameraError> {
    match self {
      #[cfg(feature = "image_file_camera")]
      CameraWrapper::ImageFile(camera) => camera.shut_down(),
      #[cfg(feature = "v4l2_camera")]
      CameraWrapper::V4l2(camera) => camera.shut_down(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_unknown_scheme() {
    let url = Url::parse("rtsp://192.168.1.100/stream").unwrap();
    assert!(matches!(
      CameraWrapper::from_url(&url),
      Err(CameraError::SchemeMismatch)
    ));
  }
}
