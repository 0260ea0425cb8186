use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::OnceCell;

use crate::exception::Exception;

/// 已渲染页面的缓存条目。内容一旦写入就不再修改，只读或整体替换。
#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    created: Instant,
}

/// 每个键一个单元格：并发的未命中共享同一个单元格，
/// `OnceCell` 保证生成函数对每个单元格至多成功执行一次。
type Slot = Arc<OnceCell<CacheEntry>>;

/// 单个命名空间的渲染结果缓存。
///
/// 键是净化后的*输入*请求路径（不是索引回退后的有效路径），值是该请求
/// 上次渲染产出的未压缩字节。没有容量上限，也没有容量淘汰；唯一会使条目
/// 消失的机制是可选的时间过期（`max_age`，0 表示永不过期）。
///
/// 缓存被同一命名空间的所有并发请求共享，内部用互斥锁保护槽表，配合
/// 每键的 `OnceCell` 提供 single-flight 语义：同一键的并发未命中只有
/// 一次生成会执行并被存储，其余请求等待并复用它的结果。失败的生成不会
/// 填充单元格，因此错误永远不会被缓存。
pub struct PageCache {
    max_age: Option<Duration>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl PageCache {
    /// 根据配置的最大寿命（秒）构造。0 表示条目永不过期。
    pub fn from_max_age(max_age_secs: u64) -> Self {
        let max_age = match max_age_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            max_age,
            slots: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn from_max_age_duration(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// 取出键对应的槽；过期的槽在这里被丢弃并换成空槽。
    fn slot(&self, key: &str) -> Slot {
        let mut slots = match self.slots.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };

        if let Some(slot) = slots.get(key) {
            let expired = match (self.max_age, slot.get()) {
                (Some(max_age), Some(entry)) => entry.created.elapsed() > max_age,
                _ => false,
            };
            if !expired {
                return Arc::clone(slot);
            }
            debug!("缓存条目已过期，丢弃重建：{}", key);
            slots.remove(key);
        }

        let slot: Slot = Arc::new(OnceCell::new());
        slots.insert(key.to_string(), Arc::clone(&slot));
        slot
    }

    /// 查询键对应的渲染结果；未命中时运行 `render` 并把成功的输出存入缓存。
    ///
    /// 命中时完全跳过 `render`，调用方不会再触碰文件系统。
    pub async fn get_or_render<F, Fut>(&self, key: &str, render: F) -> Result<Bytes, Exception>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, Exception>>,
    {
        let slot = self.slot(key);
        let entry = slot
            .get_or_try_init(|| async {
                debug!("缓存未命中：{}", key);
                let content = render().await?;
                Ok::<CacheEntry, Exception>(CacheEntry {
                    content,
                    created: Instant::now(),
                })
            })
            .await?;
        Ok(entry.content.clone())
    }

    /// 当前缓存的条目数（含尚未完成生成的槽），供管理控制台展示。
    pub fn len(&self) -> usize {
        match self.slots.lock() {
            Ok(lock) => lock.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(text: &str) -> Bytes {
        Bytes::from(text.to_string())
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = PageCache::from_max_age(0);
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_render("notes/Home", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(page("rendered"))
            })
            .await
            .unwrap();
        let second = cache
            .get_or_render("notes/Home", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(page("regenerated"))
            })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let cache = PageCache::from_max_age(0);

        let a = cache
            .get_or_render("a", || async { Ok(page("page a")) })
            .await
            .unwrap();
        let b = cache
            .get_or_render("b", || async { Ok(page("page b")) })
            .await
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_single_flight_under_concurrency() {
        let cache = Arc::new(PageCache::from_max_age(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_render("hot", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(page("expensive"))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut results = vec![];
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == &page("expensive")));
    }

    #[tokio::test]
    async fn test_failed_render_is_not_cached() {
        let cache = PageCache::from_max_age(0);
        let calls = AtomicUsize::new(0);

        let err = cache
            .get_or_render("flaky", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Exception::Internal)
            })
            .await;
        assert_eq!(err.err(), Some(Exception::Internal));

        let ok = cache
            .get_or_render("flaky", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(page("recovered"))
            })
            .await
            .unwrap();

        assert_eq!(ok, page("recovered"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_max_age_never_expires() {
        let cache = PageCache::from_max_age(0);

        cache
            .get_or_render("k", || async { Ok(page("v1")) })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let again = cache
            .get_or_render("k", || async { Ok(page("v2")) })
            .await
            .unwrap();

        assert_eq!(again, page("v1"));
    }

    #[tokio::test]
    async fn test_expired_entry_is_regenerated() {
        let cache = PageCache::from_max_age_duration(Duration::from_millis(30));

        let first = cache
            .get_or_render("k", || async { Ok(page("v1")) })
            .await
            .unwrap();
        assert_eq!(first, page("v1"));

        tokio::time::sleep(Duration::from_millis(60)).await;

        let second = cache
            .get_or_render("k", || async { Ok(page("v2")) })
            .await
            .unwrap();
        assert_eq!(second, page("v2"));
        assert_eq!(cache.len(), 1);
    }
}
