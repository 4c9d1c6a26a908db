// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/worker.rs - 推理工作线程
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
  fmt::Display,
  panic::{AssertUnwindSafe, catch_unwind},
  thread::{self, JoinHandle},
  time::Instant,
};

use anyhow::{Context, anyhow, bail};
use crossbeam_channel::{Sender, bounded, unbounded};
use tracing::{debug, error, info, warn};

use crate::{
  device::Release,
  event::{Event, EventSender, InferenceTicket},
  frame::ClassifierFrame,
  model::{ClassificationResult, ClassifyOutcome, InferenceError, Model},
  pipeline::InferenceService,
  utils::panic_message,
};

type Job = (InferenceTicket, ClassifierFrame);

/// 在独立线程中持有推理引擎，计算期间不阻塞调度线程
///
/// 引擎在工作线程内部构建，构建结果通过握手通道返回给调用者。
pub struct InferenceWorker {
  jobs: Option<Sender<Job>>,
  handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
  pub fn spawn<M, F>(build: F, events: EventSender) -> anyhow::Result<Self>
  where
    M: Model<Input = ClassifierFrame, Output = ClassificationResult> + 'static,
    M::Error: Display,
    F: FnOnce() -> anyhow::Result<M> + Send + 'static,
  {
    let (init_tx, init_rx) = bounded::<Result<(), String>>(1);
    let (jobs_tx, jobs_rx) = unbounded::<Job>();

    let handle = thread::Builder::new()
      .name("inference".to_string())
      .spawn(move || {
        let model = match catch_unwind(AssertUnwindSafe(build)) {
          Ok(Ok(model)) => {
            let _ = init_tx.send(Ok(()));
            model
          }
          Ok(Err(e)) => {
            let _ = init_tx.send(Err(format!("{:#}", e)));
            return;
          }
          Err(payload) => {
            let _ = init_tx.send(Err(panic_message(payload.as_ref())));
            return;
          }
        };

        for (ticket, frame) in jobs_rx.iter() {
          debug!("周期 {} 开始推理", ticket.cycle());
          let now = Instant::now();
          let result = match catch_unwind(AssertUnwindSafe(|| model.infer(&frame))) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(InferenceError::Engine(e.to_string())),
            Err(payload) => Err(InferenceError::Panicked(panic_message(payload.as_ref()))),
          };
          drop(frame);
          info!("周期 {} 推理结束，耗时: {:.2?}", ticket.cycle(), now.elapsed());

          if events
            .send(Event::Classified(ClassifyOutcome::new(ticket, result)))
            .is_err()
          {
            warn!("调度线程已关闭，推理线程退出");
            break;
          }
        }
        debug!("推理线程退出");
      })
      .context("无法创建推理线程")?;

    match init_rx.recv() {
      Ok(Ok(())) => {
        info!("推理引擎加载完成");
        Ok(Self {
          jobs: Some(jobs_tx),
          handle: Some(handle),
        })
      }
      Ok(Err(e)) => {
        error!("推理引擎加载失败: {}", e);
        let _ = handle.join();
        bail!("推理引擎加载失败: {}", e)
      }
      Err(e) => {
        let _ = handle.join();
        Err(anyhow!("推理线程未完成初始化: {}", e))
      }
    }
  }
}

impl InferenceService for InferenceWorker {
  fn submit(&mut self, ticket: InferenceTicket, frame: ClassifierFrame) -> Result<(), InferenceError> {
    let jobs = self.jobs.as_ref().ok_or(InferenceError::WorkerGone)?;
    jobs
      .send((ticket, frame))
      .map_err(|_| InferenceError::WorkerGone)
  }
}

impl Release for InferenceWorker {
  fn release(&mut self) -> anyhow::Result<()> {
    // 关闭任务通道后线程会处理完剩余任务再退出
    self.jobs.take();
    if let Some(handle) = self.handle.take() {
      handle
        .join()
        .map_err(|payload| anyhow!("推理线程异常退出: {}", panic_message(payload.as_ref())))?;
    }
    Ok(())
  }
}

impl Drop for InferenceWorker {
  fn drop(&mut self) {
    if let Err(e) = self.release() {
      warn!("{:#}", e);
    }
  }
}
