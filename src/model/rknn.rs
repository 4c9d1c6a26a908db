// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/rknn.rs - RKNN 图像分类模型
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

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ClassifierFrame,
  model::{ClassificationResult, LabelError, LabelTable, Model, Ranking, softmax},
  utils::query_map,
};

const RKNN_NUM_INPUTS: u32 = 1;
const RKNN_OUTPUT_INDEX: usize = 0;

#[derive(Error, Debug)]
pub enum RknnClassifierError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("读取模型输出失败: {0}")]
  OutputError(String),
  #[error("标签错误: {0}")]
  LabelError(#[from] LabelError),
  #[error("未提供标签表")]
  MissingLabels,
}

/// 单输入单输出的 RKNN 分类模型
///
/// 输入为 NHWC uint8 RGB，均值/方差在模型转换时已经固化；
/// 输出为与标签表一一对应的置信度向量。
pub struct RknnClassifier {
  context: Context,
  labels: LabelTable,
  ranking: Ranking,
  softmax: bool,
}

pub struct RknnClassifierBuilder {
  model_path: String,
  labels: Option<LabelTable>,
  ranking: Ranking,
  softmax: bool,
}

impl FromUrlWithScheme for RknnClassifierBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnClassifierBuilder {
  type Error = RknnClassifierError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RknnClassifierError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let query = query_map(url);

    Ok(RknnClassifierBuilder {
      model_path: url.path().to_string(),
      labels: None,
      ranking: Ranking::default(),
      softmax: query.contains_key("softmax"),
    })
  }
}

impl RknnClassifierBuilder {
  pub fn labels(mut self, labels: LabelTable) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn ranking(mut self, ranking: Ranking) -> Self {
    self.ranking = ranking;
    self
  }

  pub fn build(self) -> Result<RknnClassifier, RknnClassifierError> {
    let labels = self.labels.ok_or(RknnClassifierError::MissingLabels)?;

    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, InitFlags::default())?;

    let num_inputs = context.num_inputs()?;
    let num_outputs = context.num_outputs()?;
    debug!("模型输入数量: {}, 输出数量: {}", num_inputs, num_outputs);

    if num_inputs != RKNN_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNN_NUM_INPUTS, num_inputs
      );
      return Err(RknnClassifierError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNN_NUM_INPUTS, num_inputs
      )));
    }
    if num_outputs == 0 {
      return Err(RknnClassifierError::ModelInvalid("模型没有输出".to_string()));
    }

    info!("模型加载完成");
    Ok(RknnClassifier {
      context,
      labels,
      ranking: self.ranking,
      softmax: self.softmax,
    })
  }
}

impl Model for RknnClassifier {
  type Input = ClassifierFrame;
  type Output = ClassificationResult;
  type Error = RknnClassifierError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    self
      .context
      .set_input(0, input.as_nhwc(), TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    let output = self.context.get_outputs()?;
    let mut scores = output
      .get_f32(RKNN_OUTPUT_INDEX)
      .map_err(|e| RknnClassifierError::OutputError(e.to_string()))?
      .to_vec();

    if self.softmax {
      softmax(&mut scores);
    }

    let result = ClassificationResult::rank(&scores, &self.labels, self.ranking)?;
    debug!("分类结果: {:?}", result);
    Ok(result)
  }
}
