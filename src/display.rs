// 该文件是 Shanan （山南西风） 项目的一部分。
// src/display.rs - 字符显示屏
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

use std::fmt;

use thiserror::Error;
use url::Url;

use crate::{FromUrl, model::ClassificationResult};

/// 四位字母数字显示屏的宽度
pub const DISPLAY_WIDTH: usize = 4;
pub const RESULT_SEPARATOR: &str = ", ";
pub const UNKNOWN_RESULT: &str = "UNKNOWN";

#[derive(Error, Debug)]
pub enum DisplayError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数错误: {0}")]
  InvalidArgument(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 固定宽度的字符输出设备，写入是同步且可能失败的
pub trait CharDisplay {
  fn width(&self) -> usize;
  fn set_enabled(&mut self, enabled: bool) -> Result<(), DisplayError>;
  fn clear(&mut self) -> Result<(), DisplayError>;
  fn show(&mut self, text: &str) -> Result<(), DisplayError>;
  fn close(&mut self) -> Result<(), DisplayError>;
}

/// 非空的显示文本，按字符（显示单元）寻址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayText {
  cells: Box<[char]>,
}

impl DisplayText {
  /// 原样显示，不加留白；空串返回 `None`
  pub fn unpadded(text: &str) -> Option<Self> {
    if text.is_empty() {
      return None;
    }
    Some(Self {
      cells: text.chars().collect(),
    })
  }

  /// 两侧各加 `padding` 个空白单元，滚动时首尾单词都能完整移入移出
  pub fn padded(body: &str, padding: usize) -> Option<Self> {
    if body.is_empty() {
      return None;
    }
    let blank = " ".repeat(padding);
    Self::unpadded(&format!("{blank}{body}{blank}"))
  }

  /// 标签以固定分隔符连接并转为大写，空白标签跳过
  pub fn from_result(result: &ClassificationResult, padding: usize) -> Self {
    let body = result
      .labels()
      .map(str::trim)
      .filter(|label| !label.is_empty())
      .collect::<Vec<_>>()
      .join(RESULT_SEPARATOR)
      .to_uppercase();
    let body = if body.trim().is_empty() {
      UNKNOWN_RESULT.to_string()
    } else {
      body
    };
    Self::padded(&body, padding).unwrap_or_else(|| Self {
      cells: UNKNOWN_RESULT.chars().collect(),
    })
  }

  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  /// 从 `start` 开始、最多 `width` 个单元的连续片段
  pub fn window(&self, start: usize, width: usize) -> String {
    let start = start.min(self.cells.len());
    let end = start.saturating_add(width).min(self.cells.len());
    self.cells[start..end].iter().collect()
  }
}

impl fmt::Display for DisplayText {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for c in self.cells.iter() {
      write!(f, "{}", c)?;
    }
    Ok(())
  }
}

mod console;
pub use self::console::ConsoleDisplay;

mod file;
pub use self::file::FileDisplay;

pub(crate) fn width_from_url(url: &Url) -> Result<usize, DisplayError> {
  match url.query_pairs().find(|(k, _)| k == "width") {
    Some((_, v)) => match v.parse::<usize>() {
      Ok(width) if width > 0 => Ok(width),
      _ => Err(DisplayError::InvalidArgument(format!("width={}", v))),
    },
    None => Ok(DISPLAY_WIDTH),
  }
}

pub enum DisplayWrapper {
  Console(ConsoleDisplay),
  File(FileDisplay),
}

impl FromUrl for DisplayWrapper {
  type Error = DisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    if url.scheme() == <ConsoleDisplay as FromUrlWithScheme>::SCHEME {
      return Ok(DisplayWrapper::Console(<ConsoleDisplay>::from_url(url)?));
    }
    if url.scheme() == FileDisplay::SCHEME {
      return Ok(DisplayWrapper::File(FileDisplay::from_url(url)?));
    }
    Err(DisplayError::SchemeMismatch)
  }
}

impl CharDisplay for DisplayWrapper {
  fn width(&self) -> usize {
    match self {
      DisplayWrapper::Console(display) => display.width(),
      DisplayWrapper::File(display) => display.width(),
    }
  }

  fn set_enabled(&mut self, enabled: bool) -> Result<(), DisplayError> {
    match self {
      DisplayWrapper::Console(display) => display.set_enabled(enabled),
      DisplayWrapper::File(display) => display.set_enabled(enabled),
    }
  }

  fn clear(&mut self) -> Result<(), DisplayError> {
    match self {
      DisplayWrapper::Console(display) => display.clear(),
      DisplayWrapper::File(display) => display.clear(),
    }
  }

  fn show(&mut self, text: &str) -> Result<(), DisplayError> {
    match self {
      DisplayWrapper::Console(display) => display.show(text),
      DisplayWrapper::File(display) => display.show(text),
    }
  }

  fn close(&mut self) -> Result<(), DisplayError> {
    match self {
      DisplayWrapper::Console(display) => display.close(),
      DisplayWrapper::File(display) => display.close(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ClassifyItem;

  fn result(labels: &[(&str, f32)]) -> ClassificationResult {
    ClassificationResult::new(
      labels
        .iter()
        .map(|&(label, score)| ClassifyItem {
          label: label.to_string(),
          score,
        })
        .collect(),
    )
  }

  #[test]
  fn formats_ranked_labels() {
    let text = DisplayText::from_result(&result(&[("dog", 0.91), ("wolf", 0.05)]), DISPLAY_WIDTH);
    assert_eq!(text.to_string(), "    DOG, WOLF    ");
  }

  #[test]
  fn formatted_text_is_longer_than_display_plus_padding() {
    for labels in [&[("a", 1.0)][..], &[("tabby cat", 0.7), ("lynx", 0.2)][..]] {
      let text = DisplayText::from_result(&result(labels), DISPLAY_WIDTH);
      assert!(!text.is_empty());
      assert!(text.len() >= DISPLAY_WIDTH + DISPLAY_WIDTH);
      assert_eq!(text.to_string(), text.to_string().to_uppercase());
    }
    let text = DisplayText::from_result(&result(&[("a", 1.0)]), DISPLAY_WIDTH);
    assert_eq!(text.to_string(), "    A    ");
  }

  #[test]
  fn skips_blank_labels() {
    let text = DisplayText::from_result(&result(&[("dog", 0.6), ("", 0.3)]), DISPLAY_WIDTH);
    assert_eq!(text.to_string(), "    DOG    ");
    let text = DisplayText::from_result(&result(&[(" ", 0.9)]), DISPLAY_WIDTH);
    assert_eq!(text.to_string(), "    UNKNOWN    ");
  }

  #[test]
  fn empty_ranking_reads_unknown() {
    let text = DisplayText::from_result(&result(&[]), DISPLAY_WIDTH);
    assert_eq!(text.to_string(), "    UNKNOWN    ");
  }

  #[test]
  fn rejects_empty_text() {
    assert!(DisplayText::unpadded("").is_none());
    assert!(DisplayText::padded("", 4).is_none());
  }

  #[test]
  fn windows_are_char_based() {
    let text = DisplayText::unpadded("ÉCLAIR").unwrap();
    assert_eq!(text.window(0, 4), "ÉCLA");
    assert_eq!(text.window(4, 4), "IR");
    assert_eq!(text.window(9, 4), "");
  }

  #[test]
  fn parses_width_query() {
    let url = Url::parse("console://stdout?width=8").unwrap();
    assert_eq!(width_from_url(&url).unwrap(), 8);
    let url = Url::parse("console://stdout").unwrap();
    assert_eq!(width_from_url(&url).unwrap(), DISPLAY_WIDTH);
    let url = Url::parse("console://stdout?width=0").unwrap();
    assert!(width_from_url(&url).is_err());
  }
}
