// 该文件是 Shanan （山南西风） 项目的一部分。
// src/display/file.rs - 文件映射显示屏
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
  fs::{File, OpenOptions},
  io::{Seek, SeekFrom, Write},
  path::PathBuf,
};

use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  display::{CharDisplay, DisplayError, width_from_url},
};

/// 每次写入都用当前窗口覆盖整个文件
///
/// 适用于字符设备节点（如段码屏驱动导出的 `/dev/ht16k33`）或供其他进程读取的状态文件。
pub struct FileDisplay {
  path: PathBuf,
  file: Option<File>,
  width: usize,
  enabled: bool,
}

impl FileDisplay {
  pub fn open(path: impl Into<PathBuf>, width: usize) -> Result<Self, DisplayError> {
    let path = path.into();
    info!("打开显示设备: {}", path.display());
    let file = OpenOptions::new().write(true).create(true).open(&path)?;
    Ok(Self {
      path,
      file: Some(file),
      width,
      enabled: false,
    })
  }

  fn render(&mut self, cells: &str) -> Result<(), DisplayError> {
    if !self.enabled {
      return Ok(());
    }
    let file = self.file.as_mut().ok_or_else(|| {
      DisplayError::IoError(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        format!("显示设备已关闭: {}", self.path.display()),
      ))
    })?;
    let line = format!("{:<width$}", cells, width = self.width);
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(line.as_bytes())?;
    file.flush()?;
    Ok(())
  }
}

impl FromUrlWithScheme for FileDisplay {
  const SCHEME: &'static str = "file";
}

impl FromUrl for FileDisplay {
  type Error = DisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DisplayError::SchemeMismatch);
    }
    Self::open(url.path(), width_from_url(url)?)
  }
}

impl CharDisplay for FileDisplay {
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
    if let Some(mut file) = self.file.take() {
      file.flush()?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn overwrites_with_current_window() {
    let path = std::env::temp_dir().join(format!("shanan-display-{}", std::process::id()));
    let url = Url::parse(&format!("file://{}?width=4", path.display())).unwrap();
    let mut display = FileDisplay::from_url(&url).unwrap();
    display.set_enabled(true).unwrap();

    display.show("WOLF, DOG").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "WOLF");
    display.show("RDY").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "RDY ");

    display.close().unwrap();
    display.set_enabled(true).unwrap();
    assert!(display.show("DOG").is_err());

    std::fs::remove_file(&path).unwrap();
  }
}
