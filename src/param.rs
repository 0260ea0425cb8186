// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Wiki 服务器协议参数与常量模块
//!
//! 该模块定义了 `shaneyale-wikiserver` 遵循的 HTTP 协议常量和数据结构，以及
//! 文档服务特有的固定参数，包括：
//! - 常见的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 命名空间路由使用的前缀标记与路径字符集。
//! - 目录索引回退所使用的固定索引文件名。
//! - HTTP 方法、版本及编码格式的强类型枚举。

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

/// 请求的路径指向目录时，代为打开的索引文件名
pub const INDEX_FILE: &str = "Home";

/// 索引回退的最大递归深度。
///
/// 操作员如果创建了名为 `Home` 的目录并层层嵌套，索引回退将无限递归。
/// 超过该深度视为配置错误，返回 500。
pub const MAX_INDEX_DEPTH: usize = 8;

/// 原始字节模式的路由前缀（`/-raw/...`）
pub const RAW_PREFIX: &str = "-raw";

/// 命名空间路由的前缀标记（`/~notes/...`）
pub const NAMESPACE_MARKER: char = '~';

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "shaneyale-wikiserver";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 命名空间表中没有对应后缀映射时使用的兜底二进制类型
pub const FALLBACK_BINARY_TYPE: &str = "application/octet-stream";

/// 命名空间本身未知时使用的兜底文本类型
pub const FALLBACK_TEXT_TYPE: &str = "text/plain";

lazy_static! {
    /// 请求路径允许的字符集。
    ///
    /// 与路由层的匹配规则一致：字母、数字、下划线、连字符、点和斜杠。
    /// 不在该集合内的路径（包括查询字符串、百分号编码）将触发 400。
    pub static ref VALID_PATH: Regex = Regex::new(r"^[A-Za-z0-9_\-./]*$").unwrap();

    /// 命名空间键允许的字符集（不含 `~` 标记本身）。
    pub static ref VALID_NAMESPACE: Regex = Regex::new(r"^[A-Za-z0-9_]*$").unwrap();
}

lazy_static! {
    /// 服务器当前允许处理的 HTTP 方法列表。
    ///
    /// 用于在收到请求时进行初步过滤，不在该列表中的方法将触发 405 Method Not Allowed。
    pub static ref ALLOWED_METHODS: Vec<HttpRequestMethod> = {
        vec![
            HttpRequestMethod::Get,
            HttpRequestMethod::Head,
            HttpRequestMethod::Options,
        ]
    };
}

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        // 2xx: 成功响应 (Successful)
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(204, "No Content");
        map.insert(206, "Partial Content");

        // 3xx: 重定向 (Redirection)
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(304, "Not Modified");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        // 4xx: 客户端错误 (Client Error)
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(408, "Request Timeout");
        map.insert(411, "Length Required");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");

        // 5xx: 服务端错误 (Server Error)
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy)]
pub enum HttpVersion {
    /// HTTP/1.1 版本
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
    /// 查询服务器支持的选项
    Options,
    /// 提交数据或执行操作
    Post,
}

/// 支持的内容编码（压缩）格式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpEncoding {
    /// GNU zip 压缩
    Gzip,
    /// zlib 压缩
    Deflate,
    /// Brotli 压缩
    Br,
}

use std::fmt;

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_1 => write!(f, "1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
        }
    }
}

impl fmt::Display for HttpEncoding {
    /// 将枚举格式化为 `Content-Encoding` 头所使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
            HttpEncoding::Deflate => write!(f, "deflate"),
            HttpEncoding::Br => write!(f, "br"),
        }
    }
}
