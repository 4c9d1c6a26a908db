// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/keyboard.rs - 终端键盘输入
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
  io::{self, BufRead, BufReader},
  thread::{self, JoinHandle},
};

use tracing::{debug, info, warn};

use crate::{
  event::{Event, EventSender},
  input::KeyEvent,
};

/// 逐行读取终端输入并转为 [`Event::Key`]
///
/// 阻塞在 `read_line` 上的线程无法被打断，退出时不等待它。
pub struct KeyboardReader {
  _handle: JoinHandle<()>,
}

impl KeyboardReader {
  pub fn spawn_stdin(events: EventSender) -> io::Result<Self> {
    info!("键盘输入已启用：回车拍照，q 退出");
    Self::spawn(BufReader::new(io::stdin()), events)
  }

  pub fn spawn<R>(reader: R, events: EventSender) -> io::Result<Self>
  where
    R: BufRead + Send + 'static,
  {
    let handle = thread::Builder::new()
      .name("keyboard".to_string())
      .spawn(move || {
        for line in reader.lines() {
          let line = match line {
            Ok(line) => line,
            Err(e) => {
              warn!("读取键盘输入失败: {}", e);
              break;
            }
          };
          if events.send(Event::Key(KeyEvent::from_line(&line))).is_err() {
            break;
          }
        }
        debug!("键盘输入结束");
      })?;
    Ok(Self { _handle: handle })
  }
}
