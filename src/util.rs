use crate::format::escape_html;
use crate::param::STATUS_CODES;

/// 简单的 HTML 页面组装器。
///
/// 文档页与错误页共用同一个外壳：标题、内联样式表和主体三部分。
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => match STATUS_CODES.get(&code) {
                Some(d) => *d,
                None => {
                    panic!("非法的状态码：{}", code);
                }
            },
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self { title, css, body }
    }

    /// 组装一个文档页：左侧导航列表加正文。
    ///
    /// `nav_html` 是已构建好的 `<li>` 序列，`main_html` 是格式化器的输出
    /// （目标不存在时为空，页面退化为纯导航）。
    pub fn from_document(rel_path: &str, nav_html: &str, main_html: &str) -> Self {
        let title = escape_html(rel_path);
        let css = r"
            body {
                max-width: 50em;
                margin: 0 auto;
                font-family: Georgia, serif;
            }

            nav ol {
                list-style: none;
                padding-left: 0;
                border-bottom: 1px solid #ccc;
            }

            nav li {
                display: inline-block;
                margin-right: 0.8em;
            }

            pre {
                background: #f4f4f4;
                padding: 0.5em;
                overflow-x: auto;
            }"
        .to_string();
        let body = format!(
            "<nav><ol>{}</ol></nav><main>{}</main>",
            nav_html, main_html
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <!-- 本文件由shaneyale的Wiki服务器自动生成 -->
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}
