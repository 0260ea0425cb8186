// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 命名空间运行时模块
//!
//! 配置文件里的命名空间表在进程启动时被构建为 [`ServerEnv`]：每个命名空间
//! 独占自己的根目录、内容类型表和（可选的）页面缓存。整个结构在进程生存期
//! 内不可变，缓存内容是其中唯一的共享可变状态。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::info;

use crate::cache::PageCache;
use crate::config::Config;
use crate::exception::Exception;
use crate::param::{FALLBACK_BINARY_TYPE, FALLBACK_TEXT_TYPE};

/// 单个命名空间的运行时形态。
pub struct Namespace {
    key: String,
    base_path: PathBuf,
    content_types: HashMap<String, String>,
    cache: Option<PageCache>,
}

impl Namespace {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 该命名空间的页面缓存；`None` 表示每次请求都重新生成。
    pub fn cache(&self) -> Option<&PageCache> {
        self.cache.as_ref()
    }
}

/// 所有命名空间的只读集合，按键索引。
pub struct ServerEnv {
    namespaces: HashMap<String, Namespace>,
}

impl ServerEnv {
    pub fn from_config(config: &Config) -> Self {
        let mut namespaces = HashMap::new();
        for (key, ns_config) in config.namespaces() {
            let cache = match ns_config.cache_enabled() {
                true => Some(PageCache::from_max_age(ns_config.max_age())),
                false => None,
            };
            info!(
                "命名空间\"{}\"已注册：根目录{}，缓存{}",
                key,
                ns_config.base_path(),
                if cache.is_some() { "开启" } else { "关闭" },
            );
            namespaces.insert(
                key.clone(),
                Namespace {
                    key: key.clone(),
                    base_path: PathBuf::from(ns_config.base_path()),
                    content_types: ns_config.content_types().clone(),
                    cache,
                },
            );
        }
        Self { namespaces }
    }

    pub fn namespace(&self, key: &str) -> Option<&Namespace> {
        self.namespaces.get(key)
    }

    /// 同 [`ServerEnv::namespace`]，但把缺失表达为 [`Exception::UnknownNamespace`]，
    /// 供请求编排层直接用 `?`/match 转换为 404。
    pub fn lookup(&self, key: &str) -> Result<&Namespace, Exception> {
        self.namespaces.get(key).ok_or(Exception::UnknownNamespace)
    }

    /// 遍历全部命名空间（管理控制台的状态展示使用）。
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }

    /// 根据命名空间的后缀映射表解析文件的 MIME 类型。
    ///
    /// 命名空间未知时回落到纯文本；表中没有对应后缀时回落到通用二进制类型。
    pub fn content_type(&self, key: &str, filename: &str) -> &str {
        let ns = match self.namespaces.get(key) {
            Some(ns) => ns,
            None => return FALLBACK_TEXT_TYPE,
        };

        let extension = match Path::new(filename).extension().and_then(|e| e.to_str()) {
            Some(e) => e,
            None => return FALLBACK_BINARY_TYPE,
        };

        match ns.content_types.get(extension) {
            Some(mime) => mime,
            None => FALLBACK_BINARY_TYPE,
        }
    }
}
