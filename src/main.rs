// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 异步 Wiki 服务器
//!
//! 该模块实现了基于 Tokio 运行时的个人纯文本 Wiki 服务器。
//! 核心功能包括：
//! - 行式标记语言到 HTML 的渲染管线
//! - 防目录遍历的路径解析与目录索引回退
//! - 按命名空间划分的渲染结果缓存（single-flight）
//! - 原始字节模式下的流式大文件传输
//! - 后台管理控制台（CLI 指令交互）

#![allow(clippy::unused_io_amount)]

// --- 模块定义 ---
mod cache;      // 渲染结果缓存实现
mod config;     // 配置解析与管理
mod exception;  // 自定义异常与错误处理
mod format;     // 行式标记语言格式化器
mod namespace;  // 命名空间运行时环境
mod page;       // 文档页生成
mod param;      // 全局常量与静态参数
mod request;    // HTTP 请求报文解析器
mod resolve;    // 路径净化与索引回退
mod response;   // HTTP 响应报文构建器
mod util;       // 通用工具函数

use config::Config;
use namespace::ServerEnv;
use request::Request;
use response::Response;

use log::{debug, error, info, warn};
use log4rs;
use tokio::{
    fs::File as TokioFile,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::{Arc, Mutex},
    time::Instant,
};

/// # 程序入口点
///
/// 初始化日志与配置，构建多线程异步运行时并进入主事件循环。
fn main() {
    // 1. 初始化日志系统：采用 log4rs 异步日志架构，通过外部 YAML 灵活配置级别与输出目的地
    log4rs::init_file("config/log4rs.yaml", Default::default()).unwrap();

    // 2. 环境配置加载：从 TOML 文件读取运行参数与命名空间表
    let config = Config::from_toml("config/development.toml");
    info!("配置文件已载入");

    // 3. 异步运行时定制：根据配置文件动态分配工作线程数
    let worker_threads = config.worker_threads();
    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(serve(config));
}

/// # 主事件循环
///
/// 构建命名空间环境、绑定监听端口、启动管理控制台，
/// 然后持续接收新连接并分发至 Tokio 线程池。
async fn serve(config: Config) {
    // 命名空间环境在启动时构建一次，此后只读（缓存内容除外）
    let env = Arc::new(ServerEnv::from_config(&config));
    let config = Arc::new(config);

    // 网络层初始化：支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
    let port: u16 = config.port();
    info!("服务端将在{}端口上监听Socket连接", port);
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}地址上监听Socket连接", address);
    let socket = SocketAddrV4::new(address, port);

    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            panic!("无法绑定端口：{}，错误：{}", port, e);
        }
    };
    info!("端口{}绑定完成", port);

    // 服务器状态与生命周期管理
    // shutdown_flag: 用于优雅停机 (Graceful Shutdown)
    // active_connection: 追踪当前并发连接数
    let shutdown_flag = Arc::new(Mutex::new(false));
    let active_connection = Arc::new(Mutex::new(0u32));

    // 启动交互式管理控制台任务
    // 该任务运行在后台，不阻塞监听循环，提供运维指令支持
    tokio::spawn({
        let shutdown_flag = Arc::clone(&shutdown_flag);
        let active_connection = Arc::clone(&active_connection);
        let env = Arc::clone(&env);
        async move {
            let stdin = tokio::io::stdin();
            let mut reader = BufReader::new(stdin);
            let mut input = String::new();
            loop {
                input.clear();
                if let Ok(_) = reader.read_line(&mut input).await {
                    let cmd = input.trim();
                    match cmd {
                        "stop" => {
                            let mut flag = shutdown_flag.lock().unwrap();
                            *flag = true;
                            println!("停机指令已激活，服务器将在处理完下一个请求后关闭...");
                            break;
                        }
                        "help" => {
                            println!("== Wikiserver Help ==");
                            println!("stop   - 发出停机信号");
                            println!("status - 查看当前服务器运行状态");
                            println!("help   - 显示此帮助信息");
                            println!("=====================");
                        }
                        "status" => {
                            let active_count = *active_connection.lock().unwrap();
                            println!("== Wikiserver 状态 ==");
                            println!("当前活跃连接数: {}", active_count);
                            for ns in env.namespaces() {
                                if let Some(cache) = ns.cache() {
                                    println!(
                                        "命名空间\"{}\"缓存条目数: {}",
                                        ns.key(),
                                        cache.len()
                                    );
                                }
                            }
                            println!("=====================");
                        }
                        _ => {
                            println!("无效的命令：{}", cmd);
                        }
                    }
                } else {
                    break;
                }
            }
        }
    });

    let mut id: u128 = 0;

    // 主事件循环 (Accept Loop)
    loop {
        // 检查停机标志位
        if *shutdown_flag.lock().unwrap() {
            info!("主循环接收到停机指令，正在退出...");
            break;
        }

        // 等待新的 TCP 连接
        let (mut stream, addr) = listener.accept().await.unwrap();
        debug!("新的连接：{}", addr);

        // 为每个连接克隆资源句柄（Arc 引用计数增加）
        let active_connection_arc = Arc::clone(&active_connection);
        let env_arc = Arc::clone(&env);
        let config_arc = Arc::clone(&config);

        debug!("[ID{}]TCP连接已建立", id);

        // 使用轻量级绿色线程处理具体请求，确保非阻塞 IO
        tokio::spawn(async move {
            {
                // 连接计数加 1
                let mut lock = active_connection_arc.lock().unwrap();
                *lock += 1;
            }

            // 核心业务处理
            handle_connection(&mut stream, id, env_arc, config_arc).await;

            {
                // 处理完成后连接计数减 1
                let mut lock = active_connection_arc.lock().unwrap();
                *lock -= 1;
            }
        });
        id += 1; // 增加请求唯一标识序列
    }
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期：读取解析请求、路由到命名空间、
/// 构建并发送响应。文档响应在内存中整体构建后一次写出；
/// 原始字节模式下的大文件采用分块流式传输。
async fn handle_connection(
    stream: &mut TcpStream,
    id: u128,
    env: Arc<ServerEnv>,
    config: Arc<Config>,
) {
    let mut buffer = vec![0; 1024];

    // 等待流进入可读状态
    if let Err(e) = stream.readable().await {
        error!("[ID{}]等待TCPStream可读时遇到错误: {}", id, e);
        return;
    }

    // 尝试非阻塞读取 HTTP 报文
    match stream.try_read(&mut buffer) {
        Ok(0) => return, // 客户端主动关闭连接
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
        _ => {}
    }
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();

    // 1. 协议解析阶段：将字节流转换为结构化的 Request 对象
    let request = match Request::try_from(&buffer, id) {
        Ok(req) => req,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {:?}", id, e);
            let response = "HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\n\r\nBad Request";
            let _ = stream.write_all(response.as_bytes()).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    // 2. 路由匹配阶段：拆出命名空间、命名空间内路径与原始字节标志
    let response = match response::parse_route(request.path()) {
        Ok(target) => {
            debug!("[ID{}]HTTP路由解析完毕: {:?}", id, target);
            // 3. 响应构建阶段：缓存查询、文档渲染或原始文件读取
            Response::from(&target, &request, id, &env, config.streaming_threshold()).await
        }
        Err(e) => {
            warn!("[ID{}]请求的路径：{} 非法（{}），返回400", id, request.path(), e);
            Response::response_400(&request, id)
        }
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );

    // 4. 结构化日志记录：便于后期审计与性能监控
    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, ",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    // 5. 数据发送阶段
    if response.is_streaming() {
        // --- 模式 A: 流式传输 (适用于原始模式的大文件，避免内存暴涨) ---
        debug!("[ID{}]使用流式传输模式发送大文件", id);

        let response_bytes = response.as_bytes(); // 发送响应头
        if let Err(e) = stream.write_all(&response_bytes).await {
            error!("[ID{}]发送响应头失败: {}", id, e);
            return;
        }

        // 重新解析物理路径以打开文件
        if let Ok(target) = response::parse_route(request.path()) {
            if let Some(ns) = env.namespace(&target.namespace) {
                let request_path = resolve::sanitize_path(&target.path);
                match resolve::open_with_index(ns.base_path(), &request_path) {
                    Ok(resolved) => {
                        let file = match resolved.file {
                            Some(f) => f,
                            None => {
                                error!("[ID{}]流式传输时文件已消失", id);
                                return;
                            }
                        };
                        let mut file = TokioFile::from_std(file);
                        let chunk_size = config.chunk_size();
                        let mut buffer = vec![0u8; chunk_size];
                        let mut total_sent = 0u64;
                        let content_length = response.get_content_length();

                        debug!("[ID{}]开始流式传输，文件大小: {} bytes", id, content_length);

                        loop {
                            match file.read(&mut buffer).await {
                                Ok(0) => break, // 文件读取完毕
                                Ok(n) => {
                                    // 持续将缓冲区内容写入 Socket
                                    if let Err(e) = stream.write_all(&buffer[..n]).await {
                                        error!("[ID{}]流式写入失败: {}", id, e);
                                        return;
                                    }
                                    total_sent += n as u64;
                                }
                                Err(e) => {
                                    error!("[ID{}]读取文件失败: {}", id, e);
                                    return;
                                }
                            }
                        }
                        let _ = stream.flush().await;
                        debug!("[ID{}]流式传输完成，共发送 {} 字节", id, total_sent);
                    }
                    Err(e) => {
                        error!("[ID{}]流式传输时无法解析文件路径: {}", id, e);
                    }
                }
            }
        }
    } else {
        // --- 模式 B: 一次性传输 (文档页、错误页与小文件) ---
        let response_bytes = response.as_bytes();
        debug!("[ID{}]发送全量响应，长度: {}", id, response_bytes.len());
        let _ = stream.write_all(&response_bytes).await;
        let _ = stream.flush().await;
    }
}
