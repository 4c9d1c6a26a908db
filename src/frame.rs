// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 分类器输入帧定义
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

const RGB_CHANNELS: usize = 3;

/// 分类器输入边长（正方形）
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

/// 设备使用的分类器输入帧
pub type ClassifierFrame = RawImage<CLASSIFIER_INPUT_SIZE, CLASSIFIER_INPUT_SIZE>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("图像尺寸不匹配: 期望 {expected_w}x{expected_h}, 实际 {actual_w}x{actual_h}")]
  ShapeMismatch {
    expected_w: u32,
    expected_h: u32,
    actual_w: u32,
    actual_h: u32,
  },
}

/// 预处理后的 RGB 图像，NHWC 排布，尺寸在类型上固定
///
/// 创建后不可修改，交给推理引擎后即被释放。
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> RawImage<W, H> {
  const LEN: usize = RGB_CHANNELS * W as usize * H as usize;

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RawImage<W, H> {
  type Error = FrameError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(FrameError::LengthMismatch {
        expected: Self::LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> TryFrom<RgbImage> for RawImage<W, H> {
  type Error = FrameError;

  fn try_from(image: RgbImage) -> Result<Self, Self::Error> {
    let (width, height) = image.dimensions();
    if width != W || height != H {
      return Err(FrameError::ShapeMismatch {
        expected_w: W,
        expected_h: H,
        actual_w: width,
        actual_h: height,
      });
    }
    // RgbImage 本身就是 HWC 排布
    Self::try_from(image.into_raw())
  }
}
