// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了 Wiki 服务器在请求处理生命周期中可能抛出的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析错误、路径解析错误以及文档生成过程中的文件系统错误。
//! - **语义映射**：每个变体都对应特定的业务逻辑，便于上层模块将其转化为对应的
//!   HTTP 响应状态码（未知命名空间与文件缺失映射为 404，其余 I/O 故障映射为 500）。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志。

use std::fmt;
use std::io;

/// 服务器处理请求过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    /// 这通常发生在请求头或正文包含非法字符时。
    RequestIsNotUtf8,
    /// 客户端使用了服务器暂不支持的 HTTP 方法（例如：使用了非 GET/POST 方法）。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本（例如：HTTP/0.9 或过高的版本）。
    UnsupportedHttpVersion,
    /// 请求路径包含路由字符集之外的字符。对应 `400 Bad Request`。
    InvalidPath,
    /// 请求指定的命名空间没有任何配置。对应 `404 Not Found`。
    UnknownNamespace,
    /// 在命名空间的根目录下未找到所请求的文件（索引回退也已穷尽）。
    /// 在 Web 语义中对应 `404 Not Found`。
    NotFound,
    /// 其余的文件系统故障：权限不足、目录读取失败、打开文件数超限等。
    /// 对应 `500 Internal Server Error`。
    Internal,
}

use Exception::*;

impl Exception {
    /// 将底层 I/O 错误归类为文档服务的两类故障。
    ///
    /// 调用方必须区别对待这两类：`NotFound` 产生 404，其余一律 500。
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => NotFound,
            _ => Internal,
        }
    }
}

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
///
/// 工业实践中，这些描述信息常用于系统日志（Logging）以及发送给开发者的调试响应体中。
impl fmt::Display for Exception {
    /// 根据错误类型写入人类可读的描述文本。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            InvalidPath => write!(f, "Invalid path (400)"),
            UnknownNamespace => write!(f, "Unknown namespace (404)"),
            NotFound => write!(f, "File not found (404)"),
            Internal => write!(f, "Internal I/O failure (500)"),
        }
    }
}
