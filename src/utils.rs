// 该文件是 Shanan （山南西风） 项目的一部分。
// src/utils.rs - 杂项工具
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

use std::{any::Any, collections::HashMap};

use url::Url;

/// 从 `catch_unwind` 的负载中取出可读的 panic 信息
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "未知 panic".to_string()
  }
}

pub fn query_map(url: &Url) -> HashMap<String, String> {
  url
    .query_pairs()
    .map(|(k, v)| (String::from(k), String::from(v)))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_panic_messages() {
    let err = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
    assert_eq!(panic_message(err.as_ref()), "boom");

    let err = std::panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
    assert_eq!(panic_message(err.as_ref()), "formatted 1");
  }

  #[test]
  fn collects_query_pairs() {
    let url = Url::parse("gpio://sysfs/16?active_low&debounce_ms=40").unwrap();
    let query = query_map(&url);
    assert_eq!(query.get("debounce_ms").map(String::as_str), Some("40"));
    assert_eq!(query.get("active_low").map(String::as_str), Some(""));
  }
}
