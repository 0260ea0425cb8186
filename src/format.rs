// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 行式标记语言格式化模块
//!
//! 该模块把纯文本文档流转换为 HTML 片段。方言是行导向的：每一行的前缀
//! 决定它属于哪种块，空行总是关闭当前块。支持五种状态：
//!
//! | 前缀 | 块 |
//! |---|---|
//! | 三个空格 | `<pre>` 预格式化 |
//! | ` ) ` | `<pre><code>` 代码 |
//! | ` * ` | `<ul><li>` 列表 |
//! | `#`（1~5 个） | `<h1>`~`<h5>` 标题（不进入块状态） |
//! | 其他 | `<p>` 段落 |
//!
//! 格式化器对结构畸形的输入永不失败：每一行输入都映射为某种输出（至少是
//! 转义后的文本）。所有文本内容在写出前都经过 HTML 转义，文件内容无法注入
//! 标签。输入结束时仍然打开的块会被补上闭合标签。

use std::io;
use std::io::BufRead;

/// 格式化器当前所处的块结构上下文。
///
/// 仅在一次格式化调用期间存在，不跨文档持久化。
#[derive(Debug, Clone, Copy, PartialEq)]
enum Block {
    None,
    Paragraph,
    Preformatted,
    Code,
    List,
}

/// 行式标记语言到 HTML 的状态机。
pub struct Formatter {
    state: Block,
}

impl Formatter {
    pub fn new() -> Self {
        Self { state: Block::None }
    }

    /// 消费一行输入（不含换行符），把产生的 HTML 追加到 `out`。
    pub fn feed_line(&mut self, line: &str, out: &mut String) {
        if line.is_empty() {
            self.close_block(out);
            return;
        }

        match self.state {
            Block::None => self.line_in_none(line, out),
            Block::Paragraph => self.line_in_paragraph(line, out),
            Block::Preformatted => self.line_in_preformatted(line, out),
            Block::Code => self.line_in_code(line, out),
            Block::List => self.line_in_list(line, out),
        }
    }

    /// 输入结束。补上仍然打开的块的闭合标签。
    pub fn finish(&mut self, out: &mut String) {
        self.close_block(out);
    }

    /// 空行或流结束：关闭当前块并回到初始状态。
    fn close_block(&mut self, out: &mut String) {
        match self.state {
            Block::None => {}
            Block::Paragraph => out.push_str("</p>\n"),
            Block::Preformatted => out.push_str("</pre>\n"),
            Block::Code => out.push_str("</code></pre>\n"),
            Block::List => out.push_str("</ul>\n"),
        }
        self.state = Block::None;
    }

    fn line_in_none(&mut self, line: &str, out: &mut String) {
        if let Some(rest) = line.strip_prefix("   ") {
            self.state = Block::Preformatted;
            out.push_str("<pre>");
            out.push_str(&escape_html(rest));
        } else if let Some(rest) = line.strip_prefix(" ) ") {
            self.state = Block::Code;
            out.push_str("<pre><code>");
            out.push_str(&escape_html(rest));
        } else if let Some(rest) = line.strip_prefix(" * ") {
            self.state = Block::List;
            out.push_str("<ul>\n");
            write_list_item(rest, out);
        } else if line.starts_with('#') {
            write_heading(line, out);
        } else {
            self.state = Block::Paragraph;
            out.push_str("<p>");
            write_paragraph_line(line, out);
        }
    }

    fn line_in_paragraph(&mut self, line: &str, out: &mut String) {
        out.push(' ');
        write_paragraph_line(line, out);
    }

    fn line_in_preformatted(&mut self, line: &str, out: &mut String) {
        let rest = line.strip_prefix("   ").unwrap_or(line);
        out.push('\n');
        out.push_str(&escape_html(rest));
    }

    fn line_in_code(&mut self, line: &str, out: &mut String) {
        let rest = line.strip_prefix(" ) ").unwrap_or(line);
        out.push('\n');
        out.push_str(&escape_html(rest));
    }

    fn line_in_list(&mut self, line: &str, out: &mut String) {
        let rest = line.strip_prefix(" * ").unwrap_or(line);
        write_list_item(rest, out);
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

/// 把整个文本流格式化为 HTML 片段。
///
/// 逐行驱动 [`Formatter`]，输入结束后关闭未闭合的块。只有底层读取失败
/// 才会报错，标记语言本身没有任何非法输入。
pub fn format_document<R: BufRead>(reader: R, out: &mut String) -> io::Result<()> {
    let mut formatter = Formatter::new();
    for line in reader.lines() {
        formatter.feed_line(&line?, out);
    }
    formatter.finish(out);
    Ok(())
}

/// 段落行规则：以单个空格结尾的行是显式换行请求。
///
/// 去掉该空格、转义其余内容后补一个 `<br>`；否则整行转义后原样写出。
fn write_paragraph_line(line: &str, out: &mut String) {
    match line.strip_suffix(' ') {
        Some(rest) => {
            out.push_str(&escape_html(rest));
            out.push_str("<br>");
        }
        None => out.push_str(&escape_html(line)),
    }
}

fn write_list_item(text: &str, out: &mut String) {
    out.push_str("  <li>");
    out.push_str(&escape_html(text));
    out.push_str("</li>\n");
}

/// 标题规则：行首连续的 `#` 数量即级别，超出 [1,5] 时取 5。
///
/// 标记加一个分隔字符之外没有任何内容的行被静默丢弃。
fn write_heading(line: &str, out: &mut String) {
    let level = line.chars().take_while(|c| *c == '#').count().min(5);

    let rest = match line.char_indices().nth(level + 1) {
        Some((idx, _)) => &line[idx..],
        None => return,
    };

    out.push_str(&format!("<h{}>", level));
    out.push_str(&escape_html(rest));
    out.push_str(&format!("</h{}>\n", level));
}

/// 对文本做 HTML 转义，覆盖 `&`、`<`、`>` 与两种引号。
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
