// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/labels.rs - 标签表
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取标签文件 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("标签文件为空")]
  Empty,
  #[error("标签数量 {labels} 与模型输出数量 {scores} 不一致")]
  CountMismatch { labels: usize, scores: usize },
}

/// 每行一个标签，按行号对应模型输出位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  labels: Box<[String]>,
}

impl LabelTable {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let table = Self::parse(&text)?;
    debug!("标签数量: {}", table.len());
    Ok(table)
  }

  /// 空行也占一个位置，否则后续标签会错位；只去掉文件末尾的空行
  pub fn parse(text: &str) -> Result<Self, LabelError> {
    let mut labels: Vec<String> = text.lines().map(|l| l.trim().to_string()).collect();
    while labels.last().is_some_and(|l| l.is_empty()) {
      labels.pop();
    }
    if labels.is_empty() {
      return Err(LabelError::Empty);
    }
    Ok(Self {
      labels: labels.into_boxed_slice(),
    })
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keeps_inner_blank_lines_as_positions() {
    let table = LabelTable::parse("dog\n\nwolf\n\n").unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(0), Some("dog"));
    assert_eq!(table.get(1), Some(""));
    assert_eq!(table.get(2), Some("wolf"));
    assert_eq!(table.get(3), None);
  }

  #[test]
  fn rejects_empty_file() {
    assert!(matches!(LabelTable::parse("\n\n"), Err(LabelError::Empty)));
  }

  #[test]
  fn reports_missing_file() {
    let err = LabelTable::from_file("/nonexistent/labels.txt").unwrap_err();
    assert!(matches!(err, LabelError::Io { .. }));
  }
}
