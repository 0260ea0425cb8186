use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::prelude::*;

/// 单个命名空间的静态配置。
///
/// 命名空间在进程启动时一次性构建，进程生存期内不可变（缓存内容除外）。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NamespaceConfig {
    base_path: String,
    /// 文件后缀（不含点）到 MIME 类型的映射表，供原始字节模式使用
    #[serde(default)]
    content_types: HashMap<String, String>,
    /// 是否为该命名空间启用渲染结果缓存
    #[serde(default)]
    cache: bool,
    /// 缓存条目的最大寿命（秒）。0 表示永不过期
    #[serde(default)]
    max_age: u64,
}

impl NamespaceConfig {
    pub fn from_base_path(base_path: &str) -> Self {
        Self {
            base_path: base_path.to_string(),
            content_types: HashMap::new(),
            cache: false,
            max_age: 0,
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn content_types(&self) -> &HashMap<String, String> {
        &self.content_types
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache
    }

    pub fn max_age(&self) -> u64 {
        self.max_age
    }

    pub fn with_cache(mut self, max_age: u64) -> Self {
        self.cache = true;
        self.max_age = max_age;
        self
    }

    pub fn with_content_type(mut self, extension: &str, mime: &str) -> Self {
        self.content_types
            .insert(extension.to_string(), mime.to_string());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    port: u16,
    worker_threads: usize,
    local: bool,
    #[serde(default = "default_streaming_threshold")]
    streaming_threshold: u64,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    /// 命名空间键到配置的映射。键 `""` 是默认命名空间
    #[serde(default)]
    namespaces: HashMap<String, NamespaceConfig>,
}

fn default_streaming_threshold() -> u64 {
    10485760 // 10MB
}

fn default_chunk_size() -> usize {
    262144 // 256KB
}

impl Config {
    pub fn new() -> Self {
        let mut namespaces = HashMap::new();
        namespaces.insert(
            "".to_string(),
            NamespaceConfig::from_base_path("www").with_cache(0),
        );
        Self {
            port: 3000,
            worker_threads: 0,
            local: true,
            streaming_threshold: default_streaming_threshold(),
            chunk_size: default_chunk_size(),
            namespaces,
        }
    }

    pub fn from_toml(filename: &str) -> Self {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => panic!("no such file {} exception:{}", filename, e),
        };
        let mut str_val = String::new();
        match file.read_to_string(&mut str_val) {
            Ok(s) => s,
            Err(e) => panic!("Error Reading file: {}", e),
        };

        let mut raw_config: Config = match toml::from_str(&str_val) {
            Ok(t) => t,
            Err(_) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置");
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.namespaces.is_empty() {
            warn!("配置文件没有定义任何命名空间，将以www为根目录创建默认命名空间。");
            raw_config.namespaces.insert(
                "".to_string(),
                NamespaceConfig::from_base_path("www").with_cache(0),
            );
        }
        raw_config
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn streaming_threshold(&self) -> u64 {
        self.streaming_threshold
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn namespaces(&self) -> &HashMap<String, NamespaceConfig> {
        &self.namespaces
    }
}
