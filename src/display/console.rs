// 该文件是 Shanan （山南西风） 项目的一部分。
// src/display/console.rs - 终端模拟显示屏
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

use std::io::{Stderr, Write};

use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  display::{CharDisplay, DisplayError, width_from_url},
};

/// 把每次写入打印成一行 `[DOG,]`，用于没有外接显示屏的调试
pub struct ConsoleDisplay<W: Write = Stderr> {
  sink: W,
  width: usize,
  enabled: bool,
}

impl<W: Write> ConsoleDisplay<W> {
  pub fn with_sink(sink: W, width: usize) -> Self {
    Self {
      sink,
      width,
      enabled: false,
    }
  }

  pub fn into_sink(self) -> W {
    self.sink
  }

  fn render(&mut self, cells: &str) -> Result<(), DisplayError> {
    if !self.enabled {
      return Ok(());
    }
    writeln!(self.sink, "[{:<width$}]", cells, width = self.width)?;
    self.sink.flush()?;
    Ok(())
  }
}

impl FromUrlWithScheme for ConsoleDisplay {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleDisplay {
  type Error = DisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DisplayError::SchemeMismatch);
    }
    Ok(Self::with_sink(std::io::stderr(), width_from_url(url)?))
  }
}

impl<W: Write> CharDisplay for ConsoleDisplay<W> {
  fn width(&self) -> usize {
    self.width
  }

  fn set_enabled(&mut self, enabled: bool) -> Result<(), DisplayError> {
    self.enabled = enabled;
    Ok(())
  }

  fn clear(&mut self) -> Result<(), DisplayError> {
    self.render("")
  }

  fn show(&mut self, text: &str) -> Result<(), DisplayError> {
    let cells: String = text.chars().take(self.width).collect();
    self.render(&cells)
  }

  fn close(&mut self) -> Result<(), DisplayError> {
    self.enabled = false;
    self.sink.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prints_fixed_width_cells_only_when_enabled() {
    let mut display = ConsoleDisplay::with_sink(Vec::new(), 4);
    display.show("HIDDEN").unwrap();
    display.set_enabled(true).unwrap();
    display.show("DOG, WOLF").unwrap();
    display.show("RDY").unwrap();
    display.clear().unwrap();
    let out = String::from_utf8(display.into_sink()).unwrap();
    assert_eq!(out, "[DOG,]\n[RDY ]\n[    ]\n");
  }
}
