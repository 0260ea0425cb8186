// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径解析模块
//!
//! 该模块负责把攻击者可控的原始请求路径变成一个安全的相对路径，并在目标
//! 是目录时透明地替换为固定的索引文件（`Home`）。它是所有请求进入文件系统
//! 之前的唯一入口，承担两类职责：
//! 1. 净化：丢弃 `.` 与 `..` 路径段，使任何遍历尝试都无法越出命名空间根目录。
//!    注意是静默丢弃而不是拒绝请求。
//! 2. 索引回退：逐层把目录替换为 `目录/Home` 重试，直到打开一个普通文件，
//!    或在有限深度内宣告失败。

use std::fs::File;
use std::path::{Path, PathBuf};

use log::debug;

use crate::exception::Exception;
use crate::param::{INDEX_FILE, MAX_INDEX_DEPTH};

/// 一次路径解析的结果。
///
/// `rel_path` 是*有效*相对路径：发生索引回退时它与输入不同（带有追加的
/// `Home` 段）。`file` 为 `None` 表示目标不存在——调用方据此决定是返回 404
/// 还是仅渲染导航列表。
pub struct Resolved {
    pub rel_path: String,
    pub file: Option<File>,
}

/// 净化调用方提供的路径字符串。
///
/// 按 `/` 拆分后丢弃空段、`.` 段与 `..` 段，再以 `/` 重新拼接。
/// 空输入解析为空字符串，即命名空间的根目录本身。
pub fn sanitize_path(input: &str) -> String {
    input
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// 在 `base` 下尝试打开 `request_path`，目录逐层回退到索引文件。
///
/// 输入必须是已净化的相对路径。回退次数超过 [`MAX_INDEX_DEPTH`] 视为
/// 配置错误（嵌套的 `Home` 目录链），返回 `Internal`。
pub fn open_with_index(base: &Path, request_path: &str) -> Result<Resolved, Exception> {
    let mut rel = request_path.to_string();

    for _ in 0..=MAX_INDEX_DEPTH {
        let full = join_under(base, &rel);

        let file = match File::open(&full) {
            Ok(f) => f,
            Err(e) => {
                return match Exception::from_io(&e) {
                    Exception::NotFound => Ok(Resolved {
                        rel_path: rel,
                        file: None,
                    }),
                    other => Err(other),
                }
            }
        };

        let metadata = match file.metadata() {
            Ok(m) => m,
            Err(e) => {
                return match Exception::from_io(&e) {
                    Exception::NotFound => Ok(Resolved {
                        rel_path: rel,
                        file: None,
                    }),
                    other => Err(other),
                }
            }
        };

        if !metadata.is_dir() {
            return Ok(Resolved {
                rel_path: rel,
                file: Some(file),
            });
        }

        debug!("路径{:?}是目录，回退到索引文件{}", full, INDEX_FILE);
        rel = if rel.is_empty() {
            INDEX_FILE.to_string()
        } else {
            [rel.as_str(), INDEX_FILE].join("/")
        };
    }

    Err(Exception::Internal)
}

/// 把相对路径拼接到根目录下。空相对路径表示根目录自身。
pub fn join_under(base: &Path, rel: &str) -> PathBuf {
    if rel.is_empty() {
        base.to_path_buf()
    } else {
        base.join(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_drops_traversal_segments() {
        assert_eq!(sanitize_path("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_path("a/../b"), "a/b");
        assert_eq!(sanitize_path("./a/./b/."), "a/b");
    }

    #[test]
    fn test_sanitize_collapses_slashes() {
        assert_eq!(sanitize_path("a//b///c"), "a/b/c");
        assert_eq!(sanitize_path("/a/b/"), "a/b");
    }

    #[test]
    fn test_sanitize_empty_input() {
        assert_eq!(sanitize_path(""), "");
        assert_eq!(sanitize_path("/"), "");
        assert_eq!(sanitize_path("../.."), "");
    }

    #[test]
    fn test_open_regular_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("note"), "hello").unwrap();

        let resolved = open_with_index(dir.path(), "note").unwrap();
        assert_eq!(resolved.rel_path, "note");
        assert!(resolved.file.is_some());
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();

        let resolved = open_with_index(dir.path(), "absent").unwrap();
        assert_eq!(resolved.rel_path, "absent");
        assert!(resolved.file.is_none());
    }

    #[test]
    fn test_directory_falls_back_to_index() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/Home"), "index page").unwrap();

        let resolved = open_with_index(dir.path(), "notes").unwrap();
        assert_eq!(resolved.rel_path, "notes/Home");
        assert!(resolved.file.is_some());
    }

    #[test]
    fn test_empty_path_resolves_root_index() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Home"), "root index").unwrap();

        let resolved = open_with_index(dir.path(), "").unwrap();
        assert_eq!(resolved.rel_path, "Home");
        assert!(resolved.file.is_some());
    }

    #[test]
    fn test_directory_without_index_reports_effective_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("notes")).unwrap();

        // 目录存在但索引缺失：有效路径带上 Home 段，由调用方渲染纯导航页
        let resolved = open_with_index(dir.path(), "notes").unwrap();
        assert_eq!(resolved.rel_path, "notes/Home");
        assert!(resolved.file.is_none());
    }

    #[test]
    fn test_nested_index_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/Home")).unwrap();
        fs::write(dir.path().join("a/Home/Home"), "deep index").unwrap();

        let resolved = open_with_index(dir.path(), "a").unwrap();
        assert_eq!(resolved.rel_path, "a/Home/Home");
        assert!(resolved.file.is_some());
    }

    #[test]
    fn test_index_recursion_depth_is_capped() {
        let dir = TempDir::new().unwrap();
        let mut chain = PathBuf::from(dir.path());
        for _ in 0..(MAX_INDEX_DEPTH + 2) {
            chain = chain.join(INDEX_FILE);
            fs::create_dir(&chain).unwrap();
        }

        let result = open_with_index(dir.path(), "");
        assert_eq!(result.err(), Some(Exception::Internal));
    }

    proptest! {
        /// 任意输入经净化后拼接到根目录下，结果永远不会越出根目录。
        #[test]
        fn prop_sanitized_path_never_escapes_base(input in ".*") {
            let sanitized = sanitize_path(&input);

            prop_assert!(!sanitized.starts_with('/'));
            for segment in sanitized.split('/') {
                prop_assert_ne!(segment, "..");
                prop_assert_ne!(segment, ".");
            }

            let base = Path::new("/srv/wiki/www");
            let joined = join_under(base, &sanitized);
            prop_assert!(joined.starts_with(base));
        }

        /// 净化是幂等的：对已净化的路径再净化不改变结果。
        #[test]
        fn prop_sanitize_is_idempotent(input in ".*") {
            let once = sanitize_path(&input);
            prop_assert_eq!(sanitize_path(&once), once.clone());
        }
    }
}
