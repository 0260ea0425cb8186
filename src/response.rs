use crate::{
    exception::Exception,
    namespace::ServerEnv,
    page,
    param::*,
    request::Request,
    resolve,
    util::HtmlBuilder,
};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};

use std::io::{self, Read, Write};

/// 路由层解析出的请求目标：命名空间、命名空间内的原始路径、是否原始字节模式。
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTarget {
    pub namespace: String,
    pub path: String,
    pub raw: bool,
}

/// 把请求路径解析为 [`RouteTarget`]。
///
/// 路由文法：`/{path}` 是默认命名空间的文档请求；`/~ns/{path}` 指定命名空间；
/// 前缀 `/-raw/` 切换到原始字节模式。路径字符集之外的任何字符都判为非法。
pub fn parse_route(path: &str) -> Result<RouteTarget, Exception> {
    // `OPTIONS *` 的服务器整体形式：不指向任何资源，归一化到默认命名空间根
    if path == "*" {
        return Ok(RouteTarget {
            namespace: String::new(),
            path: String::new(),
            raw: false,
        });
    }

    let trimmed = match path.strip_prefix('/') {
        Some(t) => t,
        None => return Err(Exception::InvalidPath),
    };

    let (raw, rest) = match trimmed.strip_prefix(RAW_PREFIX) {
        Some("") => (true, ""),
        Some(r) if r.starts_with('/') => (true, &r[1..]),
        _ => (false, trimmed),
    };

    let (namespace, rel) = match rest.strip_prefix(NAMESPACE_MARKER) {
        Some(after) => match after.split_once('/') {
            Some((ns, p)) => (ns, p),
            None => (after, ""),
        },
        None => ("", rest),
    };

    if !VALID_NAMESPACE.is_match(namespace) || !VALID_PATH.is_match(rel) {
        return Err(Exception::InvalidPath);
    }

    Ok(RouteTarget {
        namespace: namespace.to_string(),
        path: rel.to_string(),
        raw,
    })
}

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    content: Option<Bytes>,
    /// 响应体不在 `content` 里，由连接处理器分块读取文件并写入 Socket
    streaming: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: Some(ALLOWED_METHODS.to_vec()),
            content: None,
            streaming: false,
        }
    }

    /// 可导航（HTML）请求的编排入口。
    ///
    /// 解析命名空间 → 查缓存（single-flight）→ 未命中时生成文档页 →
    /// 内容协商压缩。页面在任何字节写出之前完整生成，失败一律转换为干净的
    /// 404/500 响应，不缓存。
    async fn from_document(
        target: &RouteTarget,
        request: &Request,
        id: u128,
        env: &ServerEnv,
        headonly: bool,
    ) -> Self {
        let accept_encoding = request.accept_encoding().to_vec();

        let ns = match env.lookup(&target.namespace) {
            Ok(ns) => ns,
            Err(e) => {
                warn!(
                    "[ID{}]命名空间\"{}\"：{}，返回404",
                    id, &target.namespace, e
                );
                return Self::response_404(request, id);
            }
        };

        // 缓存键是净化后的输入路径，而不是索引回退后的有效路径
        let request_path = resolve::sanitize_path(&target.path);
        let render = || async {
            page::render_document(ns, &request_path).map(Bytes::from)
        };

        let result = match ns.cache() {
            Some(cache) => cache.get_or_render(&request_path, render).await,
            None => render().await,
        };

        let html = match result {
            Ok(html) => html,
            Err(Exception::NotFound) => {
                warn!("[ID{}]文档{}所在目录不存在，返回404", id, &request_path);
                return Self::response_404(request, id);
            }
            Err(e) => {
                error!("[ID{}]生成文档页{}失败：{}", id, &request_path, e);
                return Self::response_500(request, id);
            }
        };

        Self::from_html_bytes(html, accept_encoding, id, headonly)
            .set_date()
            .set_code(200)
            .set_version()
            .set_server_name()
            .to_owned()
    }

    /// 原始字节请求：跳过导航与格式化，不经过缓存，不压缩，字节原样送出。
    ///
    /// Content-Type 从命名空间的后缀映射表解析。超过流式阈值的文件只填
    /// 响应头，正文由连接处理器分块传输。
    fn from_raw(
        target: &RouteTarget,
        request: &Request,
        id: u128,
        env: &ServerEnv,
        streaming_threshold: u64,
        headonly: bool,
    ) -> Self {
        let ns = match env.lookup(&target.namespace) {
            Ok(ns) => ns,
            Err(e) => {
                warn!(
                    "[ID{}]命名空间\"{}\"：{}，返回404",
                    id, &target.namespace, e
                );
                return Self::response_404(request, id);
            }
        };

        let request_path = resolve::sanitize_path(&target.path);
        let resolved = match resolve::open_with_index(ns.base_path(), &request_path) {
            Ok(r) => r,
            Err(e) => {
                error!("[ID{}]解析原始路径{}失败：{}", id, &request_path, e);
                return Self::response_500(request, id);
            }
        };

        let mut file = match resolved.file {
            Some(f) => f,
            None => {
                warn!("[ID{}]原始路径{}不存在，返回404", id, &resolved.rel_path);
                return Self::response_404(request, id);
            }
        };

        let file_size = match file.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                error!("[ID{}]无法获取{}的元数据：{}", id, &resolved.rel_path, e);
                return Self::response_500(request, id);
            }
        };

        let mime = env.content_type(&target.namespace, &resolved.rel_path);

        let mut response = Self::new();
        response.allow = None;
        response.content_type = Some(mime.to_string());
        response.content_length = file_size;

        if headonly {
            response.content = None;
        } else if file_size > streaming_threshold {
            debug!(
                "[ID{}]文件大小{} bytes超过流式阈值{} bytes，使用流式传输",
                id, file_size, streaming_threshold
            );
            response.streaming = true;
        } else {
            let mut contents = Vec::with_capacity(file_size as usize);
            if let Err(e) = file.read_to_end(&mut contents) {
                error!("[ID{}]读取文件{}失败：{}", id, &resolved.rel_path, e);
                return Self::response_500(request, id);
            }
            response.content_length = contents.len() as u64;
            response.content = Some(Bytes::from(contents));
        }

        response
            .set_date()
            .set_code(200)
            .set_version()
            .set_server_name()
            .to_owned()
    }

    /// 把已渲染的页面字节包装为响应，按 Accept-Encoding 协商压缩。
    ///
    /// 缓存里保存的始终是未压缩字节，压缩在出站路径上按请求进行。
    fn from_html_bytes(
        html: Bytes,
        accept_encoding: Vec<HttpEncoding>,
        id: u128,
        headonly: bool,
    ) -> Self {
        let mut response = Self::new();
        response.allow = None;
        response.content_type = Some("text/html;charset=utf-8".to_string());

        if headonly {
            response.content_encoding = None;
            response.content_length = html.len() as u64;
            response.content = None;
            return response;
        }

        response.content_encoding = decide_encoding(&accept_encoding);
        match response.content_encoding {
            Some(HttpEncoding::Gzip) => debug!("[ID{}]使用Gzip压缩编码", id),
            Some(HttpEncoding::Br) => debug!("[ID{}]使用Brotli压缩编码", id),
            Some(HttpEncoding::Deflate) => debug!("[ID{}]使用Deflate压缩编码", id),
            None => debug!("[ID{}]不进行压缩", id),
        };

        let contents = match compress(html.to_vec(), response.content_encoding) {
            Ok(c) => c,
            Err(e) => {
                error!("[ID{}]压缩页面失败: {}，返回未压缩内容", id, e);
                response.content_encoding = None;
                html.to_vec()
            }
        };

        response.content_length = contents.len() as u64;
        response.content = Some(Bytes::from(contents));
        response
    }

    fn from_status_code(code: u16, accept_encoding: Vec<HttpEncoding>, id: u128) -> Self {
        let mut response = Self::new();
        response.content_encoding = decide_encoding(&accept_encoding);
        if code == 204 {
            response.content = None;
            response.content_encoding = None;
            response.content_type = None;
            response.allow = Some(ALLOWED_METHODS.to_vec());
            response.set_code(code);
            return response;
        }
        response.allow = None;
        match response.content_encoding {
            Some(HttpEncoding::Gzip) => debug!("[ID{}]使用Gzip压缩编码", id),
            Some(HttpEncoding::Br) => debug!("[ID{}]使用Brotli压缩编码", id),
            Some(HttpEncoding::Deflate) => debug!("[ID{}]使用Deflate压缩编码", id),
            None => debug!("[ID{}]不进行压缩", id),
        };
        let content = match code {
            404 => HtmlBuilder::from_status_code(404, Some(
                r"<h2>噢！</h2><p>你请求的文档无法找到。</p>"
            )),
            405 => HtmlBuilder::from_status_code(405, Some(
                r"<h2>噢！</h2><p>本服务器只支持GET、HEAD和OPTIONS方法。</p>"
            )),
            500 => HtmlBuilder::from_status_code(500, Some(
                r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"
            )),
            _ => HtmlBuilder::from_status_code(code, None),
        }.build();
        let content_compressed = match compress(content.into_bytes(), response.content_encoding) {
            Ok(c) => c,
            Err(e) => {
                error!("[ID{}]压缩错误页失败: {}，不进行压缩", id, e);
                response.content_encoding = None;
                HtmlBuilder::from_status_code(code, None).build().into_bytes()
            }
        };
        let bytes = Bytes::from(content_compressed);
        response.content_length = bytes.len() as u64;
        response.content = Some(bytes);
        response.content_type = Some("text/html;charset=utf-8".to_string());
        response.set_code(code);
        response
    }

    fn set_date(&mut self) -> &mut Self {
        self.date = Utc::now();
        self
    }

    fn set_version(&mut self) -> &mut Self {
        self.version = HttpVersion::V1_1;
        self
    }

    fn set_server_name(&mut self) -> &mut Self {
        self.server_name = SERVER_NAME.to_string();
        self
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&phrase) => phrase.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                panic!();
            }
        };
        self
    }

    pub fn response_404(request: &Request, id: u128) -> Self {
        let accept_encoding = request.accept_encoding().to_vec();
        Self::from_status_code(404, accept_encoding, id)
            .set_date()
            .set_code(404)
            .set_version()
            .set_server_name()
            .to_owned()
    }

    pub fn response_500(request: &Request, id: u128) -> Self {
        let accept_encoding = request.accept_encoding().to_vec();
        Self::from_status_code(500, accept_encoding, id)
            .set_date()
            .set_code(500)
            .set_version()
            .set_server_name()
            .to_owned()
    }

    pub fn response_400(request: &Request, id: u128) -> Self {
        let accept_encoding = request.accept_encoding().to_vec();
        Self::from_status_code(400, accept_encoding, id)
            .set_date()
            .set_code(400)
            .set_version()
            .set_server_name()
            .to_owned()
    }

    /// 请求编排入口：方法过滤后按目标分发到文档渲染或原始字节路径。
    pub async fn from(
        target: &RouteTarget,
        request: &Request,
        id: u128,
        env: &ServerEnv,
        streaming_threshold: u64,
    ) -> Response {
        let accept_encoding = request.accept_encoding().to_vec();
        let method = request.method();

        if method != HttpRequestMethod::Get
            && method != HttpRequestMethod::Head
            && method != HttpRequestMethod::Options
        {
            return Self::from_status_code(405, accept_encoding, id)
                .set_date()
                .set_version()
                .set_server_name()
                .to_owned();
        }

        if method == HttpRequestMethod::Options {
            debug!("[ID{}]请求方法为OPTIONS", id);
            return Self::from_status_code(204, accept_encoding, id)
                .set_date()
                .set_version()
                .set_server_name()
                .to_owned();
        }

        let headonly = match method {
            HttpRequestMethod::Head => {
                debug!("[ID{}]请求方法为HEAD", id);
                true
            }
            _ => false,
        };

        if target.raw {
            debug!("[ID{}]原始字节模式", id);
            Self::from_raw(target, request, id, env, streaming_threshold, headonly)
        } else {
            debug!("[ID{}]文档渲染模式", id);
            Self::from_document(target, request, id, env, headonly).await
        }
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        if self.content == None && self.content_type == None {
            assert_eq!(self.content_encoding, None);
        }
        let version: &str = match self.version {
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);
        let server: &str = &self.server_name;

        let header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", &t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match self.content_encoding {
                Some(e) => [
                    "Content-encoding: ",
                    match e {
                        HttpEncoding::Gzip => "gzip",
                        HttpEncoding::Deflate => "deflate",
                        HttpEncoding::Br => "br",
                    },
                    CRLF,
                ]
                .concat()
                .to_string(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            "Date: ",
            date,
            CRLF,
            "Server: ",
            server,
            CRLF,
            match &self.allow {
                Some(a) => {
                    let mut allow_str = String::new();
                    for (index, method) in a.iter().enumerate() {
                        allow_str.push_str(&format!("{}", method));
                        if index < a.len() - 1 {
                            allow_str.push_str(", ");
                        }
                    }
                    ["Allow: ", &allow_str, CRLF].concat()
                }
                None => "".to_string(),
            }
            .as_str(),
            CRLF,
        ]
        .concat();
        [
            header.as_bytes(),
            match &self.content {
                Some(c) => &c,
                None => b"",
            },
        ]
        .concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    /// 响应体是否需要由连接处理器分块传输
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn get_content_length(&self) -> u64 {
        self.content_length
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => {
            Ok(data)
        }
    };

    if let Ok(ref compressed) = result {
        let compressed_size = compressed.len();
        let ratio = if original_size > 0 {
            ((original_size as i64 - compressed_size as i64) as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes, 压缩率: {:.1}%",
            mode, original_size, compressed_size, ratio
        );
    }

    result
}

fn decide_encoding(accept_encoding: &Vec<HttpEncoding>) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else {
        None
    }
}
