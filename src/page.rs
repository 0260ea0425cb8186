// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文档页生成模块
//!
//! 一次可导航（HTML）请求的完整页面在这里生成：解析路径、列出目标所在
//! 目录作为导航、把目标文件内容交给格式化器，最后组装成完整页面。输出
//! 先在内存里完整构建，任何一步失败都以干净的错误返回——不存在写出一半
//! 再内嵌错误标记的情况。

use std::fs;
use std::io::BufReader;

use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::exception::Exception;
use crate::format::{escape_html, format_document};
use crate::namespace::Namespace;
use crate::resolve::{join_under, open_with_index, Resolved};
use crate::util::HtmlBuilder;

/// 目录项链接使用的路径段转义集：字母数字与 `-_.~` 之外全部百分号编码。
const SEGMENT_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// 为净化后的请求路径渲染完整的文档页面。
///
/// 目标文件不存在不算错误：页面退化为纯导航（所在目录的列表仍然展示）。
/// 目录列表在文件系统返回的顺序上直接渲染，不做排序。所在目录本身无法
/// 读取时按 I/O 错误分类返回 `NotFound` 或 `Internal`。
pub fn render_document(ns: &Namespace, request_path: &str) -> Result<String, Exception> {
    let Resolved { rel_path, file } = open_with_index(ns.base_path(), request_path)?;

    // 有效路径的所在目录：导航列出的是它，而不是请求路径字面指向的目录
    let rel_dir = match rel_path.rfind('/') {
        Some(i) => &rel_path[..i],
        None => "",
    };
    let full_dir = join_under(ns.base_path(), rel_dir);

    debug!(
        "渲染文档页：命名空间\"{}\"，有效路径{}，导航目录{:?}",
        ns.key(),
        rel_path,
        full_dir
    );

    let mut nav_html = String::new();
    if !rel_dir.is_empty() {
        nav_html.push_str("<li><a href=\"./../\">..</a></li>");
    }

    let entries = fs::read_dir(&full_dir).map_err(|e| Exception::from_io(&e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Exception::from_io(&e))?;
        let file_type = entry.file_type().map_err(|e| Exception::from_io(&e))?;

        let name = entry.file_name();
        let mut link = utf8_percent_encode(&name.to_string_lossy(), SEGMENT_ESCAPE).to_string();
        if file_type.is_dir() {
            link.push('/');
        }

        nav_html.push_str("<li><a href=\"./");
        nav_html.push_str(&escape_html(&link));
        nav_html.push_str("\">");
        nav_html.push_str(&escape_html(&link));
        nav_html.push_str("</a></li>");
    }

    let mut main_html = String::new();
    match file {
        Some(f) => {
            format_document(BufReader::new(f), &mut main_html)
                .map_err(|e| Exception::from_io(&e))?;
        }
        None => {
            // 目标不存在：只展示导航列表
            debug!("目标{}不存在，渲染纯导航页", rel_path);
        }
    }

    Ok(HtmlBuilder::from_document(&rel_path, &nav_html, &main_html).build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::namespace::ServerEnv;
    use std::path::Path;
    use tempfile::TempDir;

    fn env_for(base: &Path) -> ServerEnv {
        let text = format!(
            r#"
                port = 3000
                worker_threads = 1
                local = true

                [namespaces.""]
                base_path = "{}"
            "#,
            base.display()
        );
        let config: Config = toml::from_str(&text).unwrap();
        ServerEnv::from_config(&config)
    }

    #[test]
    fn test_document_page_with_content_and_nav() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Home"), "# Welcome\n\nhello world\n").unwrap();
        fs::write(dir.path().join("About"), "about page").unwrap();

        let env = env_for(dir.path());
        let ns = env.namespace("").unwrap();

        let html = render_document(ns, "").unwrap();
        assert!(html.contains("<title>Home</title>"));
        assert!(html.contains("<h1>Welcome</h1>"));
        assert!(html.contains("<p>hello world</p>"));
        assert!(html.contains("<li><a href=\"./Home\">Home</a></li>"));
        assert!(html.contains("<li><a href=\"./About\">About</a></li>"));
    }

    #[test]
    fn test_directories_get_trailing_slash() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Home"), "x").unwrap();
        fs::create_dir(dir.path().join("notes")).unwrap();

        let env = env_for(dir.path());
        let ns = env.namespace("").unwrap();

        let html = render_document(ns, "").unwrap();
        assert!(html.contains("<li><a href=\"./notes/\">notes/</a></li>"));
    }

    #[test]
    fn test_no_up_link_at_namespace_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Home"), "x").unwrap();

        let env = env_for(dir.path());
        let ns = env.namespace("").unwrap();

        let html = render_document(ns, "").unwrap();
        assert!(!html.contains("href=\"./../\""));
    }

    #[test]
    fn test_up_link_below_namespace_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/page"), "content").unwrap();

        let env = env_for(dir.path());
        let ns = env.namespace("").unwrap();

        let html = render_document(ns, "sub/page").unwrap();
        assert!(html.contains("<li><a href=\"./../\">..</a></li>"));
        assert!(html.contains("<title>sub/page</title>"));
    }

    #[test]
    fn test_missing_target_renders_nav_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Present"), "here").unwrap();

        let env = env_for(dir.path());
        let ns = env.namespace("").unwrap();

        let html = render_document(ns, "Absent").unwrap();
        assert!(html.contains("<main></main>"));
        assert!(html.contains("Present"));
    }

    #[test]
    fn test_directory_listing_of_requested_directory() {
        // 请求没有索引文件的目录：导航列出该目录自身的内容
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/one"), "1").unwrap();
        fs::write(dir.path().join("notes/two"), "2").unwrap();

        let env = env_for(dir.path());
        let ns = env.namespace("").unwrap();

        let html = render_document(ns, "notes").unwrap();
        assert!(html.contains("<title>notes/Home</title>"));
        assert!(html.contains("one"));
        assert!(html.contains("two"));
        assert!(html.contains("<main></main>"));
    }

    #[test]
    fn test_missing_containing_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let env = env_for(dir.path());
        let ns = env.namespace("").unwrap();

        let result = render_document(ns, "no/such/dir/page");
        assert_eq!(result.err(), Some(Exception::NotFound));
    }

    #[test]
    fn test_entry_names_are_encoded_and_escaped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Home"), "x").unwrap();
        fs::write(dir.path().join("with space"), "x").unwrap();

        let env = env_for(dir.path());
        let ns = env.namespace("").unwrap();

        let html = render_document(ns, "").unwrap();
        assert!(html.contains("with%20space"));
        assert!(!html.contains(">with space<"));
    }
}
