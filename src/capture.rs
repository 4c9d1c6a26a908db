// 该文件是 Shanan （山南西风） 项目的一部分。
// src/capture.rs - 单次拍照与预处理
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
  panic::{AssertUnwindSafe, catch_unwind},
  thread::{self, JoinHandle},
  time::Instant,
};

use anyhow::{Context, anyhow, bail};
use crossbeam_channel::{Sender, bounded, unbounded};
use image::{
  RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  camera::{Camera, CameraError},
  device::Release,
  event::{CaptureRequest, Event, EventSender},
  frame::{CLASSIFIER_INPUT_SIZE, ClassifierFrame, FrameError, RawImage},
  pipeline::CaptureService,
  utils::panic_message,
};

#[derive(Error, Debug)]
pub enum CaptureError {
  #[error("相机错误: {0}")]
  Camera(#[from] CameraError),
  #[error("预处理错误: {0}")]
  Preprocess(#[from] FrameError),
  #[error("空图像")]
  EmptyImage,
  #[error("拍照过程崩溃: {0}")]
  Panicked(String),
  #[error("相机线程已退出")]
  WorkerGone,
}

/// 相机对一次 [`CaptureRequest`] 的唯一回复
#[derive(Debug)]
pub struct CaptureOutcome {
  pub request: CaptureRequest,
  pub result: Result<ClassifierFrame, CaptureError>,
}

impl CaptureOutcome {
  pub fn new(request: CaptureRequest, result: Result<ClassifierFrame, CaptureError>) -> Self {
    Self { request, result }
  }
}

/// 居中裁剪到目标宽高比，再缩放到目标尺寸
pub fn preprocess<const W: u32, const H: u32>(
  image: &RgbImage,
) -> Result<RawImage<W, H>, CaptureError> {
  let (width, height) = image.dimensions();

  let (crop_w, crop_h) = if width as u64 * H as u64 > height as u64 * W as u64 {
    ((height as u64 * W as u64 / H as u64) as u32, height)
  } else {
    (width, (width as u64 * H as u64 / W as u64) as u32)
  };
  if crop_w == 0 || crop_h == 0 {
    return Err(CaptureError::EmptyImage);
  }

  let x = (width - crop_w) / 2;
  let y = (height - crop_h) / 2;
  let cropped = imageops::crop_imm(image, x, y, crop_w, crop_h).to_image();

  let resized = if (crop_w, crop_h) == (W, H) {
    cropped
  } else {
    imageops::resize(&cropped, W, H, FilterType::Triangle)
  };

  Ok(RawImage::try_from(resized)?)
}

/// 拍照会话：取帧、预处理、释放驱动帧，并且每个请求只产生一个结果
pub struct CaptureSession<C> {
  camera: C,
}

impl<C: Camera> CaptureSession<C> {
  pub fn new(camera: C) -> Self {
    Self { camera }
  }

  pub fn capture(&mut self, request: CaptureRequest) -> CaptureOutcome {
    let now = Instant::now();
    let camera = &mut self.camera;
    let grab = || camera.with_frame(preprocess::<CLASSIFIER_INPUT_SIZE, CLASSIFIER_INPUT_SIZE>);
    let result = match catch_unwind(AssertUnwindSafe(grab)) {
      Ok(Ok(Ok(frame))) => Ok(frame),
      Ok(Ok(Err(e))) => Err(e),
      Ok(Err(e)) => Err(CaptureError::Camera(e)),
      Err(payload) => Err(CaptureError::Panicked(panic_message(payload.as_ref()))),
    };
    debug!("周期 {} 拍照结束，耗时: {:.2?}", request.cycle(), now.elapsed());
    CaptureOutcome::new(request, result)
  }

  pub fn into_camera(self) -> C {
    self.camera
  }
}

/// 在独立线程中持有相机，拍照结果以 [`Event::Captured`] 送回调度线程
pub struct CaptureWorker {
  requests: Option<Sender<CaptureRequest>>,
  handle: Option<JoinHandle<Result<(), CameraError>>>,
}

impl CaptureWorker {
  pub fn spawn<C, F>(open: F, events: EventSender) -> anyhow::Result<Self>
  where
    C: Camera + 'static,
    F: FnOnce() -> anyhow::Result<C> + Send + 'static,
  {
    let (init_tx, init_rx) = bounded::<Result<(), String>>(1);
    let (requests_tx, requests_rx) = unbounded::<CaptureRequest>();

    let handle = thread::Builder::new()
      .name("camera".to_string())
      .spawn(move || {
        let camera = match catch_unwind(AssertUnwindSafe(open)) {
          Ok(Ok(camera)) => {
            let _ = init_tx.send(Ok(()));
            camera
          }
          Ok(Err(e)) => {
            let _ = init_tx.send(Err(format!("{:#}", e)));
            return Ok(());
          }
          Err(payload) => {
            let _ = init_tx.send(Err(panic_message(payload.as_ref())));
            return Ok(());
          }
        };

        let mut session = CaptureSession::new(camera);
        for request in requests_rx.iter() {
          let outcome = session.capture(request);
          if events.send(Event::Captured(outcome)).is_err() {
            warn!("调度线程已关闭，相机线程退出");
            break;
          }
        }

        info!("关闭相机");
        session.into_camera().shut_down()
      })
      .context("无法创建相机线程")?;

    match init_rx.recv() {
      Ok(Ok(())) => {
        info!("相机初始化完成");
        Ok(Self {
          requests: Some(requests_tx),
          handle: Some(handle),
        })
      }
      Ok(Err(e)) => {
        error!("相机初始化失败: {}", e);
        let _ = handle.join();
        bail!("相机初始化失败: {}", e)
      }
      Err(e) => {
        let _ = handle.join();
        Err(anyhow!("相机线程未完成初始化: {}", e))
      }
    }
  }
}

impl CaptureService for CaptureWorker {
  fn submit(&mut self, request: CaptureRequest) -> Result<(), CaptureError> {
    let requests = self.requests.as_ref().ok_or(CaptureError::WorkerGone)?;
    requests.send(request).map_err(|_| CaptureError::WorkerGone)
  }
}

impl Release for CaptureWorker {
  fn release(&mut self) -> anyhow::Result<()> {
    self.requests.take();
    if let Some(handle) = self.handle.take() {
      handle
        .join()
        .map_err(|payload| anyhow!("相机线程异常退出: {}", panic_message(payload.as_ref())))?
        .context("相机关闭失败")?;
    }
    Ok(())
  }
}

impl Drop for CaptureWorker {
  fn drop(&mut self) {
    if let Err(e) = self.release() {
      warn!("{:#}", e);
    }
  }
}
