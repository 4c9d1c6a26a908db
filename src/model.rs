// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 分类模型
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

use thiserror::Error;

use crate::event::InferenceTicket;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyItem {
  pub label: String,
  pub score: f32,
}

/// 按置信度降序排列的前 K 个分类结果
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
  pub items: Box<[ClassifyItem]>,
}

impl ClassificationResult {
  pub fn new(items: Vec<ClassifyItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.items.iter().map(|item| item.label.as_str())
  }

  /// 将与标签表对齐的置信度向量排序并截取前 K 个
  pub fn rank(scores: &[f32], labels: &LabelTable, ranking: Ranking) -> Result<Self, LabelError> {
    if scores.len() != labels.len() {
      return Err(LabelError::CountMismatch {
        labels: labels.len(),
        scores: scores.len(),
      });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    // 稳定排序，同分时保持标签表顺序
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let items = order
      .into_iter()
      .filter(|&i| scores[i] >= ranking.min_confidence)
      .take(ranking.top_k)
      .filter_map(|i| {
        labels.get(i).map(|label| ClassifyItem {
          label: label.to_string(),
          score: scores[i],
        })
      })
      .collect();

    Ok(Self::new(items))
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranking {
  pub top_k: usize,
  pub min_confidence: f32,
}

impl Default for Ranking {
  fn default() -> Self {
    Self {
      top_k: 2,
      min_confidence: 0.0,
    }
  }
}

pub fn softmax(logits: &mut [f32]) {
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let mut sum = 0.0;
  for v in logits.iter_mut() {
    *v = (*v - max).exp();
    sum += *v;
  }
  if sum > 0.0 {
    for v in logits.iter_mut() {
      *v /= sum;
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
  #[error("推理引擎错误: {0}")]
  Engine(String),
  #[error("推理引擎崩溃: {0}")]
  Panicked(String),
  #[error("推理线程已退出")]
  WorkerGone,
}

/// 推理工作线程对一次请求的唯一回复
#[derive(Debug)]
pub struct ClassifyOutcome {
  pub ticket: InferenceTicket,
  pub result: Result<ClassificationResult, InferenceError>,
}

impl ClassifyOutcome {
  pub fn new(ticket: InferenceTicket, result: Result<ClassificationResult, InferenceError>) -> Self {
    Self { ticket, result }
  }
}

mod labels;
pub use self::labels::{LabelError, LabelTable};

mod worker;
pub use self::worker::InferenceWorker;

#[cfg(feature = "rknn_classifier")]
mod rknn;
#[cfg(feature = "rknn_classifier")]
pub use self::rknn::{RknnClassifier, RknnClassifierBuilder, RknnClassifierError};
